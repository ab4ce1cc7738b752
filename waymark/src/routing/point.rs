//! Route endpoint value type.

/// Where a routing point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointSource {
    /// Derived from the user's current position fix.
    MyPosition,
    /// Picked explicitly on the map or in search.
    UserPick,
}

/// One routing endpoint, used for both origin and destination.
///
/// Equality is by coordinate and source identity, not by reference - two
/// picks of the same place are the same point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
    pub source: PointSource,
}

impl RoutePoint {
    /// A point derived from the current position fix.
    pub fn my_position(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            source: PointSource::MyPosition,
        }
    }

    /// A point picked by the user.
    pub fn user_pick(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            source: PointSource::UserPick,
        }
    }

    /// Whether this point tracks the user's own position.
    #[inline]
    pub fn is_my_position(&self) -> bool {
        self.source == PointSource::MyPosition
    }
}

impl std::fmt::Display for RoutePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.source {
            PointSource::MyPosition => "my-position",
            PointSource::UserPick => "pick",
        };
        write!(f, "{} ({:.5}, {:.5})", tag, self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_by_coordinates_and_source() {
        let a = RoutePoint::user_pick(53.5, 10.0);
        let b = RoutePoint::user_pick(53.5, 10.0);
        assert_eq!(a, b);

        // Same coordinates, different source: not the same point.
        let c = RoutePoint::my_position(53.5, 10.0);
        assert_ne!(a, c);

        let d = RoutePoint::user_pick(53.5, 10.1);
        assert_ne!(a, d);
    }

    #[test]
    fn test_is_my_position() {
        assert!(RoutePoint::my_position(0.0, 0.0).is_my_position());
        assert!(!RoutePoint::user_pick(0.0, 0.0).is_my_position());
    }
}
