//! Routing session state machine.
//!
//! Drives a single routing session through planning, building and
//! navigation against an injected asynchronous routing engine. Depends on
//! the location engine only to pull a position snapshot when an origin is
//! needed and to watch for destination arrival while navigating.
//!
//! # Usage
//!
//! ```ignore
//! let routing = Arc::new(RoutingSession::new(engine, location, settings));
//! routing.attach_delegate(ui);
//!
//! routing.prepare(Some(RoutePoint::user_pick(53.6, 10.1)));
//! // ... engine reports progress, then success ...
//! routing.start();
//! ```
//!
//! # Components
//!
//! - [`point`] - `RoutePoint` endpoint value
//! - [`engine`] - `RoutingEngine` boundary, `BuildCode` taxonomy, generations
//! - [`delegate`] - `RoutingDelegate` presentation boundary
//! - [`session`] - `RoutingSession` state machine

pub mod delegate;
pub mod engine;
pub mod point;
pub mod session;

pub use delegate::RoutingDelegate;
pub use engine::{BuildCode, Generation, RouterKind, RoutingEngine};
pub use point::{PointSource, RoutePoint};
pub use session::{BuildState, Phase, RoutingSession};
