//! Boundary traits toward the platform and the UI.
//!
//! The session calls out through these to request runtime permission, to
//! present system resolution dialogs, to surface user-actionable error
//! dialogs, and to feed accepted fixes into the downstream map core. All
//! implementations live outside this crate (or in test fakes).

use thiserror::Error;

use super::fix::Fix;
use super::provider::ResolutionIntent;

/// User-actionable location failure conditions.
///
/// Transient internal conditions (a fused connection failure, a stale
/// provider event) never appear here - they are absorbed by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    /// OS runtime permission is missing.
    #[error("location permission denied")]
    PermissionDenied,
    /// Location services are off or no usable provider exists.
    #[error("location services disabled")]
    Disabled,
}

/// Permission and settings flows handled by the host platform.
pub trait PermissionGateway: Send + Sync {
    /// Whether runtime location permission is granted.
    fn is_location_granted(&self) -> bool;

    /// Whether OS-level location services are nominally on.
    fn are_services_enabled(&self) -> bool;

    /// Ask the user for runtime location permission. The answer comes back
    /// through `LocationSession::on_permission_result`.
    fn request_permission(&self);

    /// Present the system resolution dialog for the given intent. The answer
    /// comes back through `LocationSession::on_resolution_result`.
    fn launch_resolution(&self, intent: &ResolutionIntent);
}

/// Dialog-level notifications for an attached UI.
///
/// All methods default to no-ops so a UI only implements what it renders.
pub trait LocationUiDelegate: Send + Sync {
    /// Location is off with no downgrade left to try; the UI should offer
    /// "open settings" vs dismiss.
    fn on_location_disabled(&self) {}

    /// The provider has been searching too long without a fix; the UI should
    /// offer "keep waiting" vs "stop".
    fn on_location_pending_timeout(&self) {}

    /// A user-actionable error occurred.
    fn on_location_error(&self, _error: LocationError) {}
}

/// Downstream map/navigation core receiving accepted fixes.
///
/// During first-run suppression fixes are recorded but not forwarded here,
/// so the deferred first-zoom animation still has something to play with.
pub trait CoreLocationSink: Send + Sync {
    /// An accepted fix.
    fn location_updated(&self, fix: &Fix);

    /// A user-actionable error, mirrored to the core's own state machine.
    fn location_error(&self, error: LocationError);
}
