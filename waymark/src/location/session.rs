//! Location session - orchestrates exactly one active provider.
//!
//! The session owns the "last accepted fix" slot, applies the quality
//! arbiter to every candidate, fans accepted fixes out to listeners and the
//! downstream map core, and handles the recovery paths: permission prompts,
//! settings resolution, the one-way fused-to-native downgrade, and the
//! pending-fix timeout.
//!
//! # Threading
//!
//! Raw provider callbacks originate on provider tasks and are marshalled
//! onto the session through the event channel ([`spawn_event_pump`]); past
//! that boundary everything is sequential. Internal state sits behind an
//! `RwLock`, and the lock is always released before listeners, delegates or
//! providers are called, so a listener may re-enter the session.
//!
//! # Downgrade policy
//!
//! A fused connection failure permanently (for this session's lifetime)
//! switches to the plain OS provider. `restart()` keeps the downgraded
//! provider; only a fresh session selects fused again.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::arbiter::accept_fix;
use super::delegate::{CoreLocationSink, LocationError, LocationUiDelegate, PermissionGateway};
use super::fix::{Fix, ProviderTag};
use super::mode::SessionMode;
use super::provider::{
    LocationProvider, ProviderEvent, ProviderEventReceiver, ProviderKind, ResolutionIntent,
};

/// Consumer of accepted fixes and location errors.
///
/// Listeners are notified in registration order from an immutable snapshot
/// taken at dispatch time, so a listener that unregisters itself mid-callback
/// cannot corrupt the iteration.
pub trait LocationListener: Send + Sync {
    /// An accepted fix. Also delivered once on registration if a fix is
    /// already available.
    fn on_fix(&self, fix: &Fix);

    /// A user-actionable location error.
    fn on_error(&self, _error: LocationError) {}
}

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

struct Inner {
    last_fix: Option<Fix>,
    mode: SessionMode,
    poll_interval: Duration,
    active: bool,
    use_fused: bool,
    stopped_by_user: bool,
    error_dialog_suppressed: bool,
    in_first_run: bool,
    next_listener_id: u64,
}

/// Orchestrates one active location provider and the accepted-fix state.
pub struct LocationSession {
    inner: RwLock<Inner>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn LocationListener>)>>,
    native: Arc<dyn LocationProvider>,
    fused: Option<Arc<dyn LocationProvider>>,
    permissions: Arc<dyn PermissionGateway>,
    core: Arc<dyn CoreLocationSink>,
    ui: RwLock<Option<Arc<dyn LocationUiDelegate>>>,
}

impl LocationSession {
    /// Create a session over the given providers and platform collaborators.
    ///
    /// The fused provider, when present, is preferred until it fails.
    pub fn new(
        native: Arc<dyn LocationProvider>,
        fused: Option<Arc<dyn LocationProvider>>,
        permissions: Arc<dyn PermissionGateway>,
        core: Arc<dyn CoreLocationSink>,
    ) -> Self {
        let use_fused = fused.is_some();
        Self {
            inner: RwLock::new(Inner {
                last_fix: None,
                mode: SessionMode::default(),
                poll_interval: SessionMode::default().poll_interval(),
                active: false,
                use_fused,
                stopped_by_user: false,
                error_dialog_suppressed: false,
                in_first_run: false,
                next_listener_id: 0,
            }),
            listeners: RwLock::new(Vec::new()),
            native,
            fused,
            permissions,
            core,
            ui: RwLock::new(None),
        }
    }

    // ---- lifecycle ----------------------------------------------------

    /// Start polling location updates.
    ///
    /// No-op if already active. Refuses (signalling [`LocationError::Disabled`])
    /// while updates are stopped by the user, and requests permission through
    /// the gateway instead of starting when the runtime permission is missing.
    pub fn start(&self) {
        enum Refusal {
            None,
            AlreadyActive,
            StoppedByUser,
        }

        let refusal = {
            let Ok(inner) = self.inner.read() else { return };
            if inner.active {
                Refusal::AlreadyActive
            } else if inner.stopped_by_user {
                Refusal::StoppedByUser
            } else {
                Refusal::None
            }
        };
        match refusal {
            Refusal::AlreadyActive => {
                warn!("location session already started");
                return;
            }
            Refusal::StoppedByUser => {
                debug!("location updates are stopped by the user, skipping start");
                self.notify_error(LocationError::Disabled);
                return;
            }
            Refusal::None => {}
        }

        let (interval, mode) = {
            let Ok(mut inner) = self.inner.write() else { return };
            inner.poll_interval = inner.mode.poll_interval();
            (inner.poll_interval, inner.mode)
        };

        if !self.permissions.is_location_granted() {
            warn!("location permission is not granted");
            self.notify_error(LocationError::PermissionDenied);
            self.permissions.request_permission();
            return;
        }

        let provider = self.active_provider();
        {
            let Ok(mut inner) = self.inner.write() else { return };
            inner.active = true;
        }
        info!(
            provider = %provider.kind(),
            mode = %mode,
            interval_ms = interval.as_millis() as u64,
            "starting location session"
        );
        provider.start(interval);
    }

    /// Stop polling location updates. No-op if inactive.
    pub fn stop(&self) {
        {
            let Ok(mut inner) = self.inner.write() else { return };
            if !inner.active {
                debug!("location session already stopped");
                return;
            }
            inner.active = false;
        }
        info!("stopping location session");
        self.active_provider().stop();
    }

    /// Stop, then start - used after any condition that may make different
    /// provider settings preferable.
    pub fn restart(&self) {
        debug!("restarting location session");
        self.stop();
        self.start();
    }

    /// Whether a provider is polling right now.
    pub fn is_active(&self) -> bool {
        self.inner.read().map(|i| i.active).unwrap_or(false)
    }

    /// The last accepted fix, if any.
    pub fn last_fix(&self) -> Option<Fix> {
        self.inner.read().ok().and_then(|i| i.last_fix.clone())
    }

    /// Current session mode.
    pub fn mode(&self) -> SessionMode {
        self.inner.read().map(|i| i.mode).unwrap_or_default()
    }

    /// Change the session mode.
    ///
    /// The polling interval is recomputed on the next `start()`/`restart()`;
    /// an in-progress start is not rescheduled.
    pub fn set_mode(&self, mode: SessionMode) {
        if let Ok(mut inner) = self.inner.write() {
            debug!(from = %inner.mode, to = %mode, "session mode changed");
            inner.mode = mode;
        }
    }

    /// Poll interval computed at the most recent start.
    pub fn poll_interval(&self) -> Duration {
        self.inner
            .read()
            .map(|i| i.poll_interval)
            .unwrap_or_else(|_| SessionMode::default().poll_interval())
    }

    /// Which provider variant the session is currently using.
    pub fn provider_kind(&self) -> ProviderKind {
        self.active_provider().kind()
    }

    /// Mark updates as manually stopped (or re-enabled) by the user.
    ///
    /// While set, `start()` refuses to run.
    pub fn set_stopped_by_user(&self, stopped: bool) {
        info!(stopped, "stop-by-user flag changed");
        if let Ok(mut inner) = self.inner.write() {
            inner.stopped_by_user = stopped;
        }
    }

    /// Suppress (or re-allow) the "location disabled" error dialog, so
    /// repeated identical dialogs are not stacked while one is showing.
    pub fn set_error_dialog_suppressed(&self, suppressed: bool) {
        if let Ok(mut inner) = self.inner.write() {
            inner.error_dialog_suppressed = suppressed;
        }
    }

    // ---- first run -----------------------------------------------------

    /// Enter first-run suppression: fixes are recorded but not forwarded to
    /// the map core, preserving the deferred first-zoom animation.
    pub fn enter_first_run(&self) {
        info!("entered first run");
        if let Ok(mut inner) = self.inner.write() {
            inner.in_first_run = true;
        }
    }

    /// Leave first-run suppression.
    ///
    /// If a fix was recorded meanwhile it is replayed downstream now;
    /// otherwise the session restarts so any pending error surfaces.
    pub fn exit_first_run(&self) {
        let deferred = {
            let Ok(mut inner) = self.inner.write() else { return };
            if !inner.in_first_run {
                warn!("exit_first_run called outside first run");
                return;
            }
            inner.in_first_run = false;
            inner.last_fix.clone()
        };

        match deferred {
            Some(fix) => {
                info!("first run ended with a fix available, forwarding it now");
                self.dispatch_fix(&fix, false);
            }
            None => self.restart(),
        }
    }

    // ---- listeners and delegates ---------------------------------------

    /// Register a listener.
    ///
    /// If a fix is already accepted it is delivered to the new listener once,
    /// before any future pushes, so a late-attaching consumer does not show
    /// nothing until the next update.
    pub fn add_listener(&self, listener: Arc<dyn LocationListener>) -> ListenerId {
        let id = {
            let Ok(mut inner) = self.inner.write() else {
                return ListenerId(u64::MAX);
            };
            let id = ListenerId(inner.next_listener_id);
            inner.next_listener_id += 1;
            id
        };
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push((id, Arc::clone(&listener)));
            debug!(listener = id.0, count = listeners.len(), "listener registered");
        }
        if let Some(fix) = self.last_fix() {
            listener.on_fix(&fix);
        }
        id
    }

    /// Unregister a listener. Unknown ids are ignored.
    pub fn remove_listener(&self, id: ListenerId) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.retain(|(lid, _)| *lid != id);
            debug!(listener = id.0, count = listeners.len(), "listener removed");
        }
    }

    /// Attach the dialog-presenting UI.
    pub fn attach_ui(&self, delegate: Arc<dyn LocationUiDelegate>) {
        if let Ok(mut ui) = self.ui.write() {
            *ui = Some(delegate);
        }
    }

    /// Detach the UI.
    pub fn detach_ui(&self) {
        if let Ok(mut ui) = self.ui.write() {
            *ui = None;
        }
    }

    // ---- provider events -----------------------------------------------

    /// Entry point for marshalled provider events.
    pub fn on_provider_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::FixReceived(fix) => self.on_fix_received(fix),
            ProviderEvent::ResolutionRequired(intent) => self.on_resolution_required(intent),
            ProviderEvent::Disabled => self.on_provider_disabled(),
            ProviderEvent::ConnectionFailed => self.on_provider_connection_failed(),
        }
    }

    /// A raw fix from the active provider.
    ///
    /// Runs the arbiter; on acceptance updates the last-fix slot and fans the
    /// fix out. Fixes arriving while the session is inactive (racing a stop)
    /// are discarded here.
    pub fn on_fix_received(&self, candidate: Fix) {
        let trusts_bypass = self.active_provider().trusts_bypass_arbitration();
        let in_first_run = {
            let Ok(mut inner) = self.inner.write() else { return };
            if !inner.active {
                debug!("session inactive, discarding fix");
                return;
            }
            let bypass = trusts_bypass && candidate.provider == ProviderTag::Fused;
            if !accept_fix(&candidate, inner.last_fix.as_ref(), bypass) {
                debug!(
                    provider = %candidate.provider,
                    "candidate fix is worse than the last accepted one"
                );
                return;
            }
            inner.last_fix = Some(candidate.clone());
            inner.in_first_run
        };

        debug!(
            lat = candidate.latitude,
            lon = candidate.longitude,
            provider = %candidate.provider,
            "fix accepted"
        );
        self.dispatch_fix(&candidate, in_first_run);
    }

    /// The vendor service became unreachable.
    ///
    /// Downgrades to the plain OS provider, permanently for this session.
    /// Never surfaced to the user by itself; a second failure is a no-op.
    pub fn on_provider_connection_failed(&self) {
        let Some(fused) = &self.fused else {
            debug!("connection failure without a fused provider, ignoring");
            return;
        };

        let (downgrade, was_active) = {
            let Ok(mut inner) = self.inner.write() else { return };
            if !inner.use_fused {
                debug!("already downgraded to the native provider");
                (false, inner.active)
            } else {
                inner.use_fused = false;
                (true, inner.active)
            }
        };
        if downgrade {
            warn!("fused provider unreachable, downgrading to the native provider");
            fused.stop();
            if was_active {
                self.restart();
            }
        }
    }

    /// The active provider reports no usable source.
    ///
    /// If OS settings still claim location is on and the fused provider was
    /// active, this downgrades instead of bothering the user.
    pub fn on_provider_disabled(&self) {
        let currently_fused = {
            let Ok(inner) = self.inner.read() else { return };
            if !inner.active {
                debug!("disabled report while stopped, ignoring");
                return;
            }
            inner.use_fused && self.fused.is_some()
        };

        if currently_fused && self.permissions.are_services_enabled() {
            warn!("fused provider disabled while services are on, downgrading");
            if let Some(fused) = &self.fused {
                fused.stop();
            }
            if let Ok(mut inner) = self.inner.write() {
                inner.use_fused = false;
            }
            self.restart();
            return;
        }

        let suppressed = {
            let Ok(mut inner) = self.inner.write() else { return };
            inner.last_fix = None;
            inner.error_dialog_suppressed
        };
        self.stop();
        self.notify_error(LocationError::Disabled);
        if suppressed {
            debug!("'location disabled' dialog suppressed");
        } else if let Some(ui) = self.ui_delegate() {
            ui.on_location_disabled();
        }
    }

    /// The provider needs a settings change; hand the platform intent to the
    /// gateway so the system dialog can be shown.
    pub fn on_resolution_required(&self, intent: ResolutionIntent) {
        {
            let Ok(inner) = self.inner.read() else { return };
            if !inner.active {
                debug!("resolution request while stopped, ignoring");
                return;
            }
        }
        info!(action = %intent.action, "location settings resolution required");
        self.permissions.launch_resolution(&intent);
    }

    // ---- platform results ----------------------------------------------

    /// Result of the settings resolution flow.
    pub fn on_resolution_result(&self, resolved: bool) {
        if resolved {
            info!("settings resolution granted");
            self.restart();
        } else {
            warn!("settings resolution declined");
            self.stop();
            self.notify_error(LocationError::Disabled);
        }
    }

    /// Result of the runtime permission prompt.
    pub fn on_permission_result(&self, granted: bool) {
        if granted {
            info!("location permission granted");
            if !self.is_active() {
                self.start();
            }
            return;
        }
        warn!("location permission denied");
        self.stop();
        self.notify_error(LocationError::PermissionDenied);
    }

    /// No fix has arrived for the configured duration while active.
    ///
    /// Surfaces the "keep waiting / stop" choice to the UI when permission
    /// and settings look fine (otherwise their own flows are already
    /// running).
    pub fn on_location_pending_timeout(&self) {
        if !self.is_active() {
            debug!("pending timeout while stopped, ignoring");
            return;
        }
        if self.permissions.is_location_granted() && self.permissions.are_services_enabled() {
            if let Some(ui) = self.ui_delegate() {
                ui.on_location_pending_timeout();
            }
        }
    }

    /// The user chose "stop" in the pending-timeout dialog.
    pub fn stop_by_user(&self) {
        warn!("location updates stopped by the user");
        self.set_stopped_by_user(true);
        self.notify_error(LocationError::Disabled);
        self.stop();
    }

    // ---- internals -----------------------------------------------------

    fn active_provider(&self) -> Arc<dyn LocationProvider> {
        let use_fused = self.inner.read().map(|i| i.use_fused).unwrap_or(false);
        match (&self.fused, use_fused) {
            (Some(fused), true) => Arc::clone(fused),
            _ => Arc::clone(&self.native),
        }
    }

    fn ui_delegate(&self) -> Option<Arc<dyn LocationUiDelegate>> {
        self.ui.read().ok().and_then(|ui| ui.clone())
    }

    fn listener_snapshot(&self) -> Vec<Arc<dyn LocationListener>> {
        self.listeners
            .read()
            .map(|l| l.iter().map(|(_, listener)| Arc::clone(listener)).collect())
            .unwrap_or_default()
    }

    fn dispatch_fix(&self, fix: &Fix, in_first_run: bool) {
        for listener in self.listener_snapshot() {
            listener.on_fix(fix);
        }
        if in_first_run {
            debug!("first run active, fix not forwarded to the map core");
            return;
        }
        self.core.location_updated(fix);
    }

    fn notify_error(&self, error: LocationError) {
        for listener in self.listener_snapshot() {
            listener.on_error(error);
        }
        self.core.location_error(error);
        if let Some(ui) = self.ui_delegate() {
            ui.on_location_error(error);
        }
    }
}

/// Marshal provider events onto the session.
///
/// This is the only crossing from provider tasks into session state; past it
/// everything runs sequentially, one event at a time.
pub fn spawn_event_pump(
    session: Arc<LocationSession>,
    mut events: ProviderEventReceiver,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            session.on_provider_event(event);
        }
        debug!("location event pump stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeProvider {
        kind: ProviderKind,
        trusts: bool,
        active: AtomicBool,
        started_with: Mutex<Vec<Duration>>,
    }

    impl FakeProvider {
        fn native() -> Arc<Self> {
            Arc::new(Self {
                kind: ProviderKind::Native,
                trusts: false,
                active: AtomicBool::new(false),
                started_with: Mutex::new(Vec::new()),
            })
        }

        fn fused() -> Arc<Self> {
            Arc::new(Self {
                kind: ProviderKind::Fused,
                trusts: true,
                active: AtomicBool::new(false),
                started_with: Mutex::new(Vec::new()),
            })
        }

        fn start_count(&self) -> usize {
            self.started_with.lock().unwrap().len()
        }

        fn last_interval(&self) -> Option<Duration> {
            self.started_with.lock().unwrap().last().copied()
        }
    }

    impl LocationProvider for FakeProvider {
        fn start(&self, poll_interval: Duration) {
            self.active.store(true, Ordering::SeqCst);
            self.started_with.lock().unwrap().push(poll_interval);
        }

        fn stop(&self) {
            self.active.store(false, Ordering::SeqCst);
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        fn trusts_bypass_arbitration(&self) -> bool {
            self.trusts
        }

        fn kind(&self) -> ProviderKind {
            self.kind
        }
    }

    struct FakeGateway {
        granted: AtomicBool,
        services: AtomicBool,
        permission_requests: AtomicUsize,
        resolutions: Mutex<Vec<String>>,
    }

    impl FakeGateway {
        fn allowing() -> Arc<Self> {
            Arc::new(Self {
                granted: AtomicBool::new(true),
                services: AtomicBool::new(true),
                permission_requests: AtomicUsize::new(0),
                resolutions: Mutex::new(Vec::new()),
            })
        }
    }

    impl PermissionGateway for FakeGateway {
        fn is_location_granted(&self) -> bool {
            self.granted.load(Ordering::SeqCst)
        }

        fn are_services_enabled(&self) -> bool {
            self.services.load(Ordering::SeqCst)
        }

        fn request_permission(&self) {
            self.permission_requests.fetch_add(1, Ordering::SeqCst);
        }

        fn launch_resolution(&self, intent: &ResolutionIntent) {
            self.resolutions.lock().unwrap().push(intent.action.clone());
        }
    }

    #[derive(Default)]
    struct FakeSink {
        fixes: Mutex<Vec<Fix>>,
        errors: Mutex<Vec<LocationError>>,
    }

    impl CoreLocationSink for FakeSink {
        fn location_updated(&self, fix: &Fix) {
            self.fixes.lock().unwrap().push(fix.clone());
        }

        fn location_error(&self, error: LocationError) {
            self.errors.lock().unwrap().push(error);
        }
    }

    #[derive(Default)]
    struct FakeListener {
        fixes: Mutex<Vec<Fix>>,
    }

    impl LocationListener for FakeListener {
        fn on_fix(&self, fix: &Fix) {
            self.fixes.lock().unwrap().push(fix.clone());
        }
    }

    #[derive(Default)]
    struct FakeUi {
        disabled_dialogs: AtomicUsize,
        timeout_dialogs: AtomicUsize,
    }

    impl LocationUiDelegate for FakeUi {
        fn on_location_disabled(&self) {
            self.disabled_dialogs.fetch_add(1, Ordering::SeqCst);
        }

        fn on_location_pending_timeout(&self) {
            self.timeout_dialogs.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        session: Arc<LocationSession>,
        native: Arc<FakeProvider>,
        fused: Option<Arc<FakeProvider>>,
        gateway: Arc<FakeGateway>,
        sink: Arc<FakeSink>,
    }

    fn harness(with_fused: bool) -> Harness {
        let native = FakeProvider::native();
        let fused = with_fused.then(FakeProvider::fused);
        let gateway = FakeGateway::allowing();
        let sink = Arc::new(FakeSink::default());
        let session = Arc::new(LocationSession::new(
            Arc::clone(&native) as Arc<dyn LocationProvider>,
            fused.clone().map(|f| f as Arc<dyn LocationProvider>),
            Arc::clone(&gateway) as Arc<dyn PermissionGateway>,
            Arc::clone(&sink) as Arc<dyn CoreLocationSink>,
        ));
        Harness {
            session,
            native,
            fused,
            gateway,
            sink,
        }
    }

    fn gps_fix(t_ms: u64, accuracy: f64) -> Fix {
        Fix::new(ProviderTag::NativeGps, t_ms, 53.5, 10.0).with_accuracy(accuracy)
    }

    #[test]
    fn test_start_stop_idempotent() {
        let h = harness(false);

        h.session.start();
        h.session.start();
        assert!(h.session.is_active());
        assert_eq!(h.native.start_count(), 1);

        h.session.stop();
        h.session.stop();
        assert!(!h.session.is_active());
    }

    #[test]
    fn test_default_mode_interval() {
        let h = harness(false);
        h.session.start();
        assert_eq!(h.native.last_interval(), Some(Duration::from_millis(3000)));
    }

    #[test]
    fn test_mode_change_applies_on_next_start() {
        let h = harness(false);
        h.session.start();
        assert_eq!(h.native.last_interval(), Some(Duration::from_millis(3000)));

        h.session.set_mode(SessionMode::NavigatingVehicle);
        // Still the old interval until a restart.
        assert_eq!(h.session.poll_interval(), Duration::from_millis(3000));

        h.session.restart();
        assert_eq!(h.native.last_interval(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_stopped_by_user_refuses_start() {
        let h = harness(false);
        h.session.set_stopped_by_user(true);

        h.session.start();
        assert!(!h.session.is_active());
        assert_eq!(h.native.start_count(), 0);
        assert_eq!(
            h.sink.errors.lock().unwrap().as_slice(),
            &[LocationError::Disabled]
        );

        h.session.set_stopped_by_user(false);
        h.session.start();
        assert!(h.session.is_active());
    }

    #[test]
    fn test_missing_permission_requests_it_instead_of_starting() {
        let h = harness(false);
        h.gateway.granted.store(false, Ordering::SeqCst);

        h.session.start();
        assert!(!h.session.is_active());
        assert_eq!(h.gateway.permission_requests.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.sink.errors.lock().unwrap().as_slice(),
            &[LocationError::PermissionDenied]
        );

        h.gateway.granted.store(true, Ordering::SeqCst);
        h.session.on_permission_result(true);
        assert!(h.session.is_active());
    }

    #[test]
    fn test_accepted_fix_reaches_listeners_and_core() {
        let h = harness(false);
        let listener = Arc::new(FakeListener::default());
        h.session
            .add_listener(Arc::clone(&listener) as Arc<dyn LocationListener>);

        h.session.start();
        h.session.on_fix_received(gps_fix(0, 10.0));

        assert_eq!(listener.fixes.lock().unwrap().len(), 1);
        assert_eq!(h.sink.fixes.lock().unwrap().len(), 1);
        assert!(h.session.last_fix().is_some());
    }

    #[test]
    fn test_worse_fix_is_rejected() {
        let h = harness(false);
        h.session.start();

        h.session.on_fix_received(gps_fix(0, 10.0));
        h.session.on_fix_received(gps_fix(0, 50.0));

        assert_eq!(h.sink.fixes.lock().unwrap().len(), 1);
        assert_eq!(h.session.last_fix().unwrap().accuracy_m, Some(10.0));
    }

    #[test]
    fn test_fix_discarded_while_inactive() {
        let h = harness(false);
        h.session.on_fix_received(gps_fix(0, 10.0));

        assert!(h.session.last_fix().is_none());
        assert!(h.sink.fixes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fused_fix_bypasses_arbiter_through_session() {
        let h = harness(true);
        h.session.start();

        h.session.on_fix_received(gps_fix(0, 5.0));
        // Much worse fused fix at the same instant still wins.
        let fused_fix = Fix::new(ProviderTag::Fused, 0, 53.6, 10.1).with_accuracy(100.0);
        h.session.on_fix_received(fused_fix);

        assert_eq!(h.session.last_fix().unwrap().provider, ProviderTag::Fused);
    }

    #[test]
    fn test_fused_tag_without_trusted_provider_gets_no_bypass() {
        // Session downgraded to native: a Fused-tagged fix must pass the
        // general comparison.
        let h = harness(true);
        h.session.start();
        h.session.on_provider_connection_failed();

        h.session.on_fix_received(gps_fix(0, 5.0));
        let fused_fix = Fix::new(ProviderTag::Fused, 0, 53.6, 10.1).with_accuracy(100.0);
        h.session.on_fix_received(fused_fix);

        assert_eq!(
            h.session.last_fix().unwrap().provider,
            ProviderTag::NativeGps
        );
    }

    #[test]
    fn test_first_run_suppresses_core_forwarding() {
        let h = harness(false);
        let listener = Arc::new(FakeListener::default());
        h.session
            .add_listener(Arc::clone(&listener) as Arc<dyn LocationListener>);
        h.session.enter_first_run();
        h.session.start();

        h.session.on_fix_received(gps_fix(0, 10.0));
        assert_eq!(listener.fixes.lock().unwrap().len(), 1);
        assert!(h.sink.fixes.lock().unwrap().is_empty());

        h.session.exit_first_run();
        assert_eq!(h.sink.fixes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_listener_replay_on_attach() {
        let h = harness(false);
        h.session.start();
        h.session.on_fix_received(gps_fix(0, 10.0));

        let late = Arc::new(FakeListener::default());
        h.session
            .add_listener(Arc::clone(&late) as Arc<dyn LocationListener>);
        assert_eq!(late.fixes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_listener_stops_delivery() {
        let h = harness(false);
        h.session.start();
        let listener = Arc::new(FakeListener::default());
        let id = h
            .session
            .add_listener(Arc::clone(&listener) as Arc<dyn LocationListener>);

        h.session.on_fix_received(gps_fix(0, 10.0));
        h.session.remove_listener(id);
        h.session.on_fix_received(gps_fix(10_000, 5.0));

        assert_eq!(listener.fixes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_downgrade_is_one_way() {
        let h = harness(true);
        let fused = h.fused.as_ref().unwrap();
        h.session.start();
        assert_eq!(h.session.provider_kind(), ProviderKind::Fused);
        assert_eq!(fused.start_count(), 1);

        h.session.on_provider_connection_failed();
        assert_eq!(h.session.provider_kind(), ProviderKind::Native);
        assert!(h.session.is_active());
        assert_eq!(h.native.start_count(), 1);

        // Second failure changes nothing.
        h.session.on_provider_connection_failed();
        assert_eq!(h.session.provider_kind(), ProviderKind::Native);
        assert_eq!(h.native.start_count(), 1);

        // An explicit restart stays on the native provider.
        h.session.restart();
        assert_eq!(h.session.provider_kind(), ProviderKind::Native);
        assert_eq!(fused.start_count(), 1);
    }

    #[test]
    fn test_disabled_fused_downgrades_when_services_on() {
        let h = harness(true);
        h.session.start();

        h.session.on_provider_disabled();
        assert_eq!(h.session.provider_kind(), ProviderKind::Native);
        assert!(h.session.is_active());
    }

    #[test]
    fn test_disabled_native_clears_fix_and_notifies_ui() {
        let h = harness(false);
        let ui = Arc::new(FakeUi::default());
        h.session.attach_ui(Arc::clone(&ui) as Arc<dyn LocationUiDelegate>);
        h.session.start();
        h.session.on_fix_received(gps_fix(0, 10.0));

        h.session.on_provider_disabled();
        assert!(h.session.last_fix().is_none());
        assert!(!h.session.is_active());
        assert_eq!(ui.disabled_dialogs.load(Ordering::SeqCst), 1);
        assert!(h
            .sink
            .errors
            .lock()
            .unwrap()
            .contains(&LocationError::Disabled));
    }

    #[test]
    fn test_disabled_dialog_suppression() {
        let h = harness(false);
        let ui = Arc::new(FakeUi::default());
        h.session.attach_ui(Arc::clone(&ui) as Arc<dyn LocationUiDelegate>);
        h.session.set_error_dialog_suppressed(true);
        h.session.start();

        h.session.on_provider_disabled();
        assert_eq!(ui.disabled_dialogs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resolution_flow() {
        let h = harness(true);
        h.session.start();

        h.session
            .on_resolution_required(ResolutionIntent::new("settings.LOCATION_SOURCE"));
        assert_eq!(
            h.gateway.resolutions.lock().unwrap().as_slice(),
            &["settings.LOCATION_SOURCE".to_string()]
        );

        h.session.on_resolution_result(true);
        assert!(h.session.is_active());

        h.session.on_resolution_result(false);
        assert!(!h.session.is_active());
    }

    #[test]
    fn test_pending_timeout_gating() {
        let h = harness(false);
        let ui = Arc::new(FakeUi::default());
        h.session.attach_ui(Arc::clone(&ui) as Arc<dyn LocationUiDelegate>);

        // Inactive: ignored.
        h.session.on_location_pending_timeout();
        assert_eq!(ui.timeout_dialogs.load(Ordering::SeqCst), 0);

        h.session.start();
        h.session.on_location_pending_timeout();
        assert_eq!(ui.timeout_dialogs.load(Ordering::SeqCst), 1);

        // Permission missing: the permission flow owns the conversation.
        h.gateway.granted.store(false, Ordering::SeqCst);
        h.session.on_location_pending_timeout();
        assert_eq!(ui.timeout_dialogs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_by_user_blocks_restart() {
        let h = harness(false);
        h.session.start();

        h.session.stop_by_user();
        assert!(!h.session.is_active());

        h.session.start();
        assert!(!h.session.is_active());
    }
}
