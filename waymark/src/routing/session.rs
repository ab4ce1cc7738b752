//! Routing session state machine.
//!
//! A single routing session moves through three phases - idle, planning,
//! navigating - while an asynchronous build sub-state tracks the external
//! engine's progress. The session pulls one position snapshot from the
//! location session whenever an origin is needed and registers itself as a
//! location listener only while navigating, for destination-reached
//! detection; the location session never references routing.
//!
//! # Stale callbacks
//!
//! Every build request carries a generation number. `prepare()`, `cancel()`
//! and each rebuild bump the counter, and engine callbacks tagged with an
//! older generation are dropped, so a result that arrives after the user
//! cancelled cannot resurrect stale state.

use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::config::{keys, Settings};
use crate::location::fix::Fix;
use crate::location::mode::SessionMode;
use crate::location::session::{ListenerId, LocationListener, LocationSession};

use super::delegate::RoutingDelegate;
use super::engine::{BuildCode, Generation, RouterKind, RoutingEngine};
use super::point::RoutePoint;

/// Top-level session phase. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Planning,
    Navigating,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Planning => write!(f, "planning"),
            Self::Navigating => write!(f, "navigating"),
        }
    }
}

/// Sub-state of the asynchronous route build.
///
/// Only meaningful while planning or immediately after the transition to
/// navigating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildState {
    #[default]
    NoRoute,
    Building,
    Built,
    Failed(BuildCode),
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRoute => write!(f, "no-route"),
            Self::Building => write!(f, "building"),
            Self::Built => write!(f, "built"),
            Self::Failed(code) => write!(f, "failed({})", code),
        }
    }
}

struct Inner {
    phase: Phase,
    build_state: BuildState,
    origin: Option<RoutePoint>,
    destination: Option<RoutePoint>,
    last_build_progress: u8,
    router: RouterKind,
    generation: Generation,
    listener_id: Option<ListenerId>,
}

/// State machine for one routing session.
pub struct RoutingSession {
    inner: RwLock<Inner>,
    engine: Arc<dyn RoutingEngine>,
    location: Arc<LocationSession>,
    settings: Arc<Settings>,
    delegate: RwLock<Option<Arc<dyn RoutingDelegate>>>,
}

impl RoutingSession {
    /// Create an idle session.
    ///
    /// The router kind is restored from settings, defaulting to vehicle.
    pub fn new(
        engine: Arc<dyn RoutingEngine>,
        location: Arc<LocationSession>,
        settings: Arc<Settings>,
    ) -> Self {
        let router = settings
            .get(keys::SECTION_ROUTING, keys::KEY_LAST_ROUTER)
            .and_then(|value| RouterKind::from_str(&value))
            .unwrap_or(RouterKind::Vehicle);
        Self {
            inner: RwLock::new(Inner {
                phase: Phase::Idle,
                build_state: BuildState::NoRoute,
                origin: None,
                destination: None,
                last_build_progress: 0,
                router,
                generation: 0,
                listener_id: None,
            }),
            engine,
            location,
            settings,
            delegate: RwLock::new(None),
        }
    }

    /// Attach the presentation delegate.
    pub fn attach_delegate(&self, delegate: Arc<dyn RoutingDelegate>) {
        if let Ok(mut slot) = self.delegate.write() {
            *slot = Some(delegate);
        }
    }

    /// Detach the presentation delegate.
    pub fn detach_delegate(&self) {
        if let Ok(mut slot) = self.delegate.write() {
            *slot = None;
        }
    }

    // ---- state access --------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.inner.read().map(|i| i.phase).unwrap_or_default()
    }

    pub fn build_state(&self) -> BuildState {
        self.inner.read().map(|i| i.build_state).unwrap_or_default()
    }

    pub fn origin(&self) -> Option<RoutePoint> {
        self.inner.read().ok().and_then(|i| i.origin)
    }

    pub fn destination(&self) -> Option<RoutePoint> {
        self.inner.read().ok().and_then(|i| i.destination)
    }

    /// Last reported build progress, 0-100.
    pub fn last_build_progress(&self) -> u8 {
        self.inner.read().map(|i| i.last_build_progress).unwrap_or(0)
    }

    pub fn router_kind(&self) -> RouterKind {
        self.inner.read().map(|i| i.router).unwrap_or(RouterKind::Vehicle)
    }

    /// Current build generation. Engine callbacks tagged with anything older
    /// are dropped.
    pub fn build_generation(&self) -> Generation {
        self.inner.read().map(|i| i.generation).unwrap_or(0)
    }

    pub fn is_planning(&self) -> bool {
        self.phase() == Phase::Planning
    }

    pub fn is_navigating(&self) -> bool {
        self.phase() == Phase::Navigating
    }

    pub fn is_building(&self) -> bool {
        self.is_planning() && self.build_state() == BuildState::Building
    }

    pub fn is_built(&self) -> bool {
        self.build_state() == BuildState::Built
    }

    // ---- session lifecycle ---------------------------------------------

    /// Begin planning a route.
    ///
    /// Any existing session is cancelled first. The origin is seeded from
    /// the current position fix; without one the transition aborts with a
    /// no-position report and the session stays idle. With a destination
    /// supplied the build starts immediately, otherwise the session waits in
    /// planning for the user to supply one.
    pub fn prepare(&self, destination: Option<RoutePoint>) -> bool {
        debug!(p2p = destination.is_some(), "prepare");

        if !self
            .settings
            .get_bool(keys::SECTION_ROUTING, keys::KEY_DISCLAIMER_ACCEPTED)
        {
            info!("routing disclaimer not accepted yet, holding planning");
            self.notify(|d| d.on_disclaimer_required());
            return false;
        }

        self.cancel();

        let Some(origin) = self.my_position() else {
            warn!("no position fix available to seed the origin");
            self.notify(|d| d.on_no_position());
            return false;
        };

        let has_destination = destination.is_some();
        {
            let Ok(mut inner) = self.inner.write() else { return false };
            inner.origin = Some(origin);
            inner.destination = destination;
            inner.phase = Phase::Planning;
            debug!(phase = %Phase::Planning, "phase changed");
        }
        self.notify(|d| d.on_phase_changed(Phase::Planning));
        self.notify(|d| d.on_points_changed());

        if has_destination {
            self.build();
        }
        true
    }

    /// Persist the user's acceptance of the routing disclaimer.
    pub fn accept_disclaimer(&self) {
        info!("routing disclaimer accepted");
        if let Err(error) = self.settings.set_bool(
            keys::SECTION_ROUTING,
            keys::KEY_DISCLAIMER_ACCEPTED,
            true,
        ) {
            warn!(%error, "failed to persist disclaimer acceptance");
        }
    }

    /// Begin navigation on the built route.
    ///
    /// Valid only from a built plan. A my-position origin is refreshed to the
    /// current fix so turn-following starts from where the user actually is;
    /// without a fix the session reports no-position and stays in planning.
    pub fn start(self: &Arc<Self>) -> bool {
        enum Outcome {
            NoPosition,
            Navigating(RouterKind),
        }

        let refreshed = self.my_position();
        let outcome = {
            let Ok(mut inner) = self.inner.write() else { return false };
            if inner.phase != Phase::Planning || inner.build_state != BuildState::Built {
                warn!(
                    phase = %inner.phase,
                    build_state = %inner.build_state,
                    "start is only valid from a built plan"
                );
                return false;
            }
            let needs_fix = inner.origin.is_some_and(|o| o.is_my_position());
            match (needs_fix, refreshed) {
                (true, None) => Outcome::NoPosition,
                (true, Some(point)) => {
                    inner.origin = Some(point);
                    inner.phase = Phase::Navigating;
                    Outcome::Navigating(inner.router)
                }
                (false, _) => {
                    inner.phase = Phase::Navigating;
                    Outcome::Navigating(inner.router)
                }
            }
        };

        match outcome {
            Outcome::NoPosition => {
                warn!("no position fix to navigate from");
                self.notify(|d| d.on_no_position());
                false
            }
            Outcome::Navigating(router) => {
                info!(router = %router, "navigation started");
                self.engine.follow_route();
                self.location.set_mode(router.session_mode());
                self.location.restart();

                let id = self
                    .location
                    .add_listener(Arc::clone(self) as Arc<dyn LocationListener>);
                if let Ok(mut inner) = self.inner.write() {
                    inner.listener_id = Some(id);
                }
                self.notify(|d| d.on_phase_changed(Phase::Navigating));
                true
            }
        }
    }

    /// Cancel the session, returning to idle.
    ///
    /// Clears both endpoints, invalidates any in-flight engine callback and
    /// closes the engine's routing context. Returns false when already idle.
    pub fn cancel(&self) -> bool {
        match self.phase() {
            Phase::Idle => {
                debug!("cancel: nothing to cancel");
                false
            }
            Phase::Planning => {
                debug!("cancel: planning");
                self.cancel_internal();
                self.notify(|d| d.on_phase_changed(Phase::Idle));
                true
            }
            Phase::Navigating => {
                debug!("cancel: navigating");
                self.cancel_internal();
                self.notify(|d| d.on_phase_changed(Phase::Idle));
                self.notify(|d| d.on_navigation_cancelled());
                self.location.set_mode(SessionMode::NotFollowing);
                self.location.restart();
                true
            }
        }
    }

    // ---- endpoints -----------------------------------------------------

    /// Set the origin.
    ///
    /// Setting the current origin again is a no-op. Setting a point equal to
    /// the destination swaps the endpoints, but only if an origin already
    /// exists - otherwise there is nothing to swap into the destination slot
    /// and the call is rejected. A build starts when both endpoints are set.
    pub fn set_origin(&self, point: RoutePoint) -> bool {
        {
            let Ok(mut inner) = self.inner.write() else { return false };
            if inner.phase == Phase::Navigating {
                warn!("cannot change the origin while navigating");
                return false;
            }
            if inner.origin == Some(point) {
                debug!("set_origin: skip the same origin");
                return false;
            }
            if Some(point) == inner.destination {
                if inner.origin.is_none() {
                    debug!("set_origin: skip, nothing to swap into the destination slot");
                    return false;
                }
                debug!("set_origin: swap with destination");
                inner.destination = inner.origin.take();
            }
            inner.origin = Some(point);
        }
        self.after_points_changed();
        true
    }

    /// Set the destination.
    ///
    /// Setting the current destination again is a no-op, except that with no
    /// origin it triggers "use my position as origin". Setting a point equal
    /// to the origin swaps the endpoints when a destination exists, and
    /// otherwise moves the point into the destination slot and falls back to
    /// my position for the origin. A build starts when both endpoints are
    /// set.
    pub fn set_destination(&self, point: RoutePoint) -> bool {
        enum Action {
            SeedOrigin,
            Changed,
        }

        let action = {
            let Ok(mut inner) = self.inner.write() else { return false };
            if inner.phase == Phase::Navigating {
                warn!("cannot change the destination while navigating");
                return false;
            }
            if inner.destination == Some(point) {
                if inner.origin.is_none() {
                    debug!("set_destination: same destination with no origin, seeding origin");
                    Action::SeedOrigin
                } else {
                    debug!("set_destination: skip the same destination");
                    return false;
                }
            } else {
                if Some(point) == inner.origin {
                    if inner.destination.is_some() {
                        debug!("set_destination: swap with origin");
                        inner.origin = inner.destination.take();
                    } else {
                        // The origin moves into the destination slot; my
                        // position becomes the new origin below.
                        inner.origin = None;
                    }
                }
                inner.destination = Some(point);
                if inner.origin.is_none() {
                    Action::SeedOrigin
                } else {
                    Action::Changed
                }
            }
        };

        match action {
            Action::SeedOrigin => self.set_origin_from_my_position(),
            Action::Changed => {
                self.after_points_changed();
                true
            }
        }
    }

    /// Exchange origin and destination, even if either is unset, and rebuild
    /// if both ended up set. Rejected while navigating.
    pub fn swap_points(&self) -> bool {
        {
            let Ok(mut inner) = self.inner.write() else { return false };
            if inner.phase == Phase::Navigating {
                warn!("cannot swap points while navigating");
                return false;
            }
            debug!("swapping points");
            let inner = &mut *inner;
            std::mem::swap(&mut inner.origin, &mut inner.destination);
        }
        self.after_points_changed();
        true
    }

    /// Switch the router kind, persist it, and rebuild an existing plan.
    ///
    /// Setting the current kind again is a no-op.
    pub fn set_router_kind(&self, router: RouterKind) -> bool {
        let rebuild = {
            let Ok(mut inner) = self.inner.write() else { return false };
            if inner.phase == Phase::Navigating {
                warn!("cannot change the router kind while navigating");
                return false;
            }
            if inner.router == router {
                debug!(router = %router, "router kind unchanged");
                return false;
            }
            info!(from = %inner.router, to = %router, "router kind changed");
            inner.router = router;
            inner.phase == Phase::Planning
                && inner.origin.is_some()
                && inner.destination.is_some()
        };

        if let Err(error) =
            self.settings
                .set(keys::SECTION_ROUTING, keys::KEY_LAST_ROUTER, router.as_str())
        {
            warn!(%error, "failed to persist router kind");
        }
        if rebuild {
            self.build();
        }
        true
    }

    // ---- engine callbacks ----------------------------------------------

    /// Engine answer to a build request.
    ///
    /// Results from a superseded generation are dropped.
    pub fn on_build_result(
        &self,
        generation: Generation,
        code: BuildCode,
        missing_data: Vec<String>,
    ) {
        enum Outcome {
            Stale,
            Built(RouterKind),
            Failed(RouterKind, bool),
        }

        let outcome = {
            let Ok(mut inner) = self.inner.write() else { return };
            if generation != inner.generation {
                debug!(
                    generation,
                    current = inner.generation,
                    "dropping stale build result"
                );
                Outcome::Stale
            } else if code.is_success() {
                inner.build_state = BuildState::Built;
                inner.last_build_progress = 100;
                Outcome::Built(inner.router)
            } else {
                inner.build_state = BuildState::Failed(code);
                inner.last_build_progress = 0;
                Outcome::Failed(inner.router, code.is_downloadable(!missing_data.is_empty()))
            }
        };

        match outcome {
            Outcome::Stale => {}
            Outcome::Built(router) => {
                info!(generation, "route built");
                self.notify(|d| d.on_build_state_changed(BuildState::Built));
                self.notify(|d| d.on_build_progress(100, router));
            }
            Outcome::Failed(_, downloadable) => {
                warn!(generation, code = %code, downloadable, "route build failed");
                self.notify(|d| d.on_build_state_changed(BuildState::Failed(code)));
                self.notify(|d| d.on_build_failed(code, &missing_data, downloadable));
            }
        }
    }

    /// Engine build progress tick.
    ///
    /// Applied only while the matching generation is still building; a late
    /// tick after failure or cancel must not resurrect stale state.
    pub fn on_build_progress(&self, generation: Generation, percent: u8) {
        let update = {
            let Ok(mut inner) = self.inner.write() else { return };
            if generation != inner.generation {
                debug!(
                    generation,
                    current = inner.generation,
                    "dropping stale build progress"
                );
                return;
            }
            if inner.build_state != BuildState::Building {
                debug!(percent, "progress tick outside an active build, ignoring");
                return;
            }
            let percent = percent.min(100);
            inner.last_build_progress = percent;
            (percent, inner.router)
        };
        self.notify(|d| d.on_build_progress(update.0, update.1));
    }

    // ---- internals -----------------------------------------------------

    fn my_position(&self) -> Option<RoutePoint> {
        self.location
            .last_fix()
            .map(|fix| RoutePoint::my_position(fix.latitude, fix.longitude))
    }

    fn set_origin_from_my_position(&self) -> bool {
        debug!("set origin from my position");
        match self.my_position() {
            Some(point) => self.set_origin(point),
            None => {
                debug!("no position fix, leaving the origin unset");
                self.notify(|d| d.on_points_changed());
                false
            }
        }
    }

    fn after_points_changed(&self) {
        self.notify(|d| d.on_points_changed());
        let ready = {
            let Ok(inner) = self.inner.read() else { return };
            inner.origin.is_some() && inner.destination.is_some()
        };
        if ready {
            self.build();
        }
    }

    /// Issue a build request for the current endpoints under a fresh
    /// generation.
    fn build(&self) {
        let request = {
            let Ok(mut inner) = self.inner.write() else { return };
            let (Some(origin), Some(destination)) = (inner.origin, inner.destination) else {
                return;
            };
            inner.generation += 1;
            inner.build_state = BuildState::Building;
            inner.last_build_progress = 0;
            (inner.generation, origin, destination, inner.router)
        };

        let (generation, origin, destination, router) = request;
        info!(
            generation,
            router = %router,
            from = %origin,
            to = %destination,
            "requesting route build"
        );
        self.notify(|d| d.on_build_state_changed(BuildState::Building));
        self.notify(|d| d.on_build_progress(0, router));
        self.engine.build_route(&origin, &destination, router, generation);
    }

    fn cancel_internal(&self) {
        let listener = {
            let Ok(mut inner) = self.inner.write() else { return };
            inner.origin = None;
            inner.destination = None;
            inner.build_state = BuildState::NoRoute;
            inner.last_build_progress = 0;
            inner.generation += 1;
            inner.phase = Phase::Idle;
            debug!(generation = inner.generation, "session state cleared");
            inner.listener_id.take()
        };
        if let Some(id) = listener {
            self.location.remove_listener(id);
        }
        self.engine.close_routing();
    }

    fn notify(&self, f: impl FnOnce(&dyn RoutingDelegate)) {
        let delegate = self.delegate.read().ok().and_then(|d| d.clone());
        if let Some(delegate) = delegate {
            f(&*delegate);
        }
    }
}

impl LocationListener for RoutingSession {
    /// Destination-reached detection: while navigating, every accepted fix
    /// triggers a route-finished query against the engine.
    fn on_fix(&self, _fix: &Fix) {
        if !self.is_navigating() {
            return;
        }
        if self.engine.is_route_finished() {
            info!("destination reached");
            self.notify(|d| d.on_route_completed());
            self.cancel();
        }
    }
}
