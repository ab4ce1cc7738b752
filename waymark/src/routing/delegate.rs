//! Presentation boundary for the routing session.
//!
//! The session reports state here for the UI to render; it never renders
//! anything itself. All methods default to no-ops.

use super::engine::{BuildCode, RouterKind};
use super::session::{BuildState, Phase};

/// UI-facing notifications from the routing session.
pub trait RoutingDelegate: Send + Sync {
    /// The session moved between idle, planning and navigating.
    fn on_phase_changed(&self, _phase: Phase) {}

    /// The asynchronous build advanced to a new state.
    fn on_build_state_changed(&self, _state: BuildState) {}

    /// Build progress, 0-100, with the router the route is built for.
    fn on_build_progress(&self, _percent: u8, _router: RouterKind) {}

    /// The build failed. `downloadable` is true when fetching the listed
    /// missing data can fix it; otherwise only retry/adjust-points applies.
    fn on_build_failed(&self, _code: BuildCode, _missing_data: &[String], _downloadable: bool) {}

    /// Origin and/or destination changed.
    fn on_points_changed(&self) {}

    /// Navigation reached the destination; the session is idle again.
    fn on_route_completed(&self) {}

    /// Navigation was cancelled before completion.
    fn on_navigation_cancelled(&self) {}

    /// The routing disclaimer has not been accepted yet; planning is held
    /// until it is.
    fn on_disclaimer_required(&self) {}

    /// No position fix was available to seed the origin.
    fn on_no_position(&self) {}
}
