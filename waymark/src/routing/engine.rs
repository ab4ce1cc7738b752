//! Boundary to the native routing engine.
//!
//! The engine is an opaque asynchronous service: build requests are
//! fire-and-forget, results and progress come back through callbacks tagged
//! with the build generation they were issued under. The session drops
//! callbacks whose generation is stale, so an engine that answers late or
//! out of order cannot corrupt session state.

use crate::location::mode::SessionMode;

use super::point::RoutePoint;

/// Monotonically increasing counter invalidating stale engine callbacks.
///
/// Incremented on every `prepare()`, `cancel()` and rebuild.
pub type Generation = u64;

/// Which router the engine should plan with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterKind {
    Vehicle,
    Pedestrian,
    Bicycle,
    Transit,
}

impl RouterKind {
    /// The navigation session mode matching this router.
    pub fn session_mode(&self) -> SessionMode {
        match self {
            Self::Vehicle => SessionMode::NavigatingVehicle,
            Self::Pedestrian => SessionMode::NavigatingPedestrian,
            Self::Bicycle => SessionMode::NavigatingBicycle,
            Self::Transit => SessionMode::NavigatingTransit,
        }
    }

    /// Stable name for settings persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vehicle => "vehicle",
            Self::Pedestrian => "pedestrian",
            Self::Bicycle => "bicycle",
            Self::Transit => "transit",
        }
    }

    /// Parse a persisted name. Unknown names are `None`.
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "vehicle" => Some(Self::Vehicle),
            "pedestrian" => Some(Self::Pedestrian),
            "bicycle" => Some(Self::Bicycle),
            "transit" => Some(Self::Transit),
            _ => None,
        }
    }
}

impl std::fmt::Display for RouterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result codes the engine reports for a build request.
///
/// Mirrors the native engine's integer codes; `NoError` is the only success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildCode {
    /// Route built.
    NoError,
    /// The request was cancelled before completion.
    Cancelled,
    /// No position available to seed the origin.
    NoPosition,
    /// Loaded region data disagrees with the requested route.
    InconsistentRegionRoute,
    /// A routing file for the area is missing entirely.
    RouteFileNotExist,
    /// Origin could not be matched to the road graph.
    StartPointNotFound,
    /// Destination could not be matched to the road graph.
    EndPointNotFound,
    /// Endpoints fall in regions with no routing connection between them.
    PointsInDifferentRegions,
    /// The graph holds no route between the endpoints.
    RouteNotFound,
    /// More map data is required to complete the route.
    NeedMoreMaps,
    /// Engine-internal failure.
    InternalError,
    /// Routing data is too old for this engine version.
    FileTooOld,
    /// No transit route (network unavailable or too much walking).
    TransitRouteNotFound,
}

impl BuildCode {
    /// Whether this code means the route was built.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::NoError)
    }

    /// Whether downloading the reported missing data can fix this failure.
    ///
    /// Only meaningful with a non-empty missing-data list; bad coordinates,
    /// internal errors and cross-region limitations stay non-downloadable
    /// regardless.
    pub fn is_downloadable(&self, has_missing_data: bool) -> bool {
        has_missing_data
            && matches!(
                self,
                Self::InconsistentRegionRoute
                    | Self::RouteFileNotExist
                    | Self::RouteNotFound
                    | Self::NeedMoreMaps
                    | Self::FileTooOld
            )
    }
}

impl std::fmt::Display for BuildCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoError => "no-error",
            Self::Cancelled => "cancelled",
            Self::NoPosition => "no-position",
            Self::InconsistentRegionRoute => "inconsistent-region-route",
            Self::RouteFileNotExist => "route-file-not-exist",
            Self::StartPointNotFound => "start-point-not-found",
            Self::EndPointNotFound => "end-point-not-found",
            Self::PointsInDifferentRegions => "points-in-different-regions",
            Self::RouteNotFound => "route-not-found",
            Self::NeedMoreMaps => "need-more-maps",
            Self::InternalError => "internal-error",
            Self::FileTooOld => "file-too-old",
            Self::TransitRouteNotFound => "transit-route-not-found",
        };
        f.write_str(name)
    }
}

/// The native routing engine, injected as an asynchronous boundary.
///
/// `build_route` must eventually answer through
/// `RoutingSession::on_build_result` with the same generation; progress goes
/// through `RoutingSession::on_build_progress`. Nothing here blocks.
pub trait RoutingEngine: Send + Sync {
    /// Request an asynchronous route build.
    fn build_route(
        &self,
        origin: &RoutePoint,
        destination: &RoutePoint,
        router: RouterKind,
        generation: Generation,
    );

    /// Begin turn-following on the built route.
    fn follow_route(&self);

    /// Close the routing context, discarding any route.
    fn close_routing(&self);

    /// Whether the followed route has been completed.
    fn is_route_finished(&self) -> bool;
}
