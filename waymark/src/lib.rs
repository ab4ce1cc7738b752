//! Waymark - positioning and routing session core for a map navigation client
//!
//! This library contains the two tightly-coupled subsystems a navigation
//! client is built around:
//!
//! - [`location`] - acquires positioning fixes from heterogeneous providers
//!   (plain OS provider, vendor fused provider), arbitrates fix quality, and
//!   fans accepted fixes out to listeners.
//! - [`routing`] - the routing session state machine: planning, asynchronous
//!   route builds against an external routing engine, and navigation with
//!   destination-reached detection.
//!
//! Everything user-facing (screens, dialogs, map rendering) is modelled as a
//! boundary trait and injected; the core never renders anything itself.
//!
//! # High-Level API
//!
//! ```ignore
//! use waymark::location::{LocationSession, spawn_event_pump};
//! use waymark::routing::RoutingSession;
//!
//! let location = Arc::new(LocationSession::new(native, Some(fused), permissions, core_sink));
//! spawn_event_pump(Arc::clone(&location), provider_events);
//!
//! let routing = Arc::new(RoutingSession::new(engine, Arc::clone(&location), settings));
//! routing.prepare(Some(destination));
//! ```

pub mod config;
pub mod location;
pub mod logging;
pub mod routing;

/// Version of the waymark library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
