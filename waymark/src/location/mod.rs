//! Location acquisition engine.
//!
//! Abstracts over heterogeneous positioning providers behind a single
//! four-message contract, arbitrates fix quality, and fans accepted fixes
//! out to listeners - one of which is the routing session when it needs
//! "my position".
//!
//! # Architecture
//!
//! Data flows one direction: provider task -> event channel -> session ->
//! arbiter -> listeners/core. The session keeps exactly one provider active:
//!
//! - **Fused provider** - vendor positioning service, trusted to bypass the
//!   arbiter; preferred while reachable.
//! - **Native provider** - the plain OS feed; the one-way downgrade target
//!   after a fused connection failure.
//!
//! # Usage
//!
//! ```ignore
//! let (events_tx, events_rx) = event_channel();
//! let native = Arc::new(NativeProvider::new(os_feed, events_tx.clone()));
//! let fused = Arc::new(FusedProvider::new(vendor_feed, events_tx));
//!
//! let session = Arc::new(LocationSession::new(native, Some(fused), permissions, core));
//! spawn_event_pump(Arc::clone(&session), events_rx);
//! session.start();
//! ```
//!
//! # Components
//!
//! - [`fix`] - `Fix` reading and `ProviderTag`
//! - [`arbiter`] - pure fix-acceptance decision
//! - [`provider`] - provider contract, event channel, feed boundary
//! - [`native`] / [`fused`] - the two provider variants
//! - [`mode`] - `SessionMode` and polling intervals
//! - [`delegate`] - permission/UI/core boundary traits
//! - [`session`] - `LocationSession` orchestration

pub mod arbiter;
pub mod delegate;
pub mod fix;
pub mod fused;
pub mod mode;
pub mod native;
pub mod provider;
pub mod session;

pub use arbiter::accept_fix;
pub use delegate::{CoreLocationSink, LocationError, LocationUiDelegate, PermissionGateway};
pub use fix::{current_timestamp_ms, Fix, ProviderTag};
pub use fused::FusedProvider;
pub use mode::SessionMode;
pub use native::NativeProvider;
pub use provider::{
    event_channel, FixSource, LocationProvider, ProviderEvent, ProviderEventReceiver,
    ProviderEventSender, ProviderKind, ResolutionIntent, SourcePoll,
};
pub use session::{spawn_event_pump, ListenerId, LocationListener, LocationSession};
