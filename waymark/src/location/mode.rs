//! Session modes and the polling interval they imply.

use std::time::Duration;

const INTERVAL_FOLLOW_MS: u64 = 1000;
const INTERVAL_FOLLOW_AND_ROTATE_MS: u64 = 3000;
const INTERVAL_NOT_FOLLOWING_MS: u64 = 3000;
const INTERVAL_NAVIGATION_VEHICLE_MS: u64 = 500;
const INTERVAL_NAVIGATION_BICYCLE_MS: u64 = 1000;
const INTERVAL_NAVIGATION_PEDESTRIAN_MS: u64 = 1000;
const INTERVAL_NAVIGATION_TRANSIT_MS: u64 = 1000;

/// What the session is currently doing with position updates.
///
/// Owned and mutated only by the location session in response to external
/// mode-change notifications; consumers read it to pick polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Map is not following the user.
    #[default]
    NotFollowing,
    /// Map centered on the user.
    Follow,
    /// Map centered and rotated with the user's bearing.
    FollowAndRotate,
    /// Turn-by-turn navigation by car.
    NavigatingVehicle,
    /// Turn-by-turn navigation by bicycle.
    NavigatingBicycle,
    /// Turn-by-turn navigation on foot.
    NavigatingPedestrian,
    /// Public transport navigation.
    NavigatingTransit,
}

impl SessionMode {
    /// Whether this is one of the turn-by-turn navigation modes.
    pub fn is_navigating(&self) -> bool {
        matches!(
            self,
            Self::NavigatingVehicle
                | Self::NavigatingBicycle
                | Self::NavigatingPedestrian
                | Self::NavigatingTransit
        )
    }

    /// Polling interval for this mode.
    ///
    /// Navigation polls faster than map browsing; vehicle navigation fastest
    /// of all.
    pub fn poll_interval(&self) -> Duration {
        let ms = match self {
            Self::Follow => INTERVAL_FOLLOW_MS,
            Self::FollowAndRotate => INTERVAL_FOLLOW_AND_ROTATE_MS,
            Self::NotFollowing => INTERVAL_NOT_FOLLOWING_MS,
            Self::NavigatingVehicle => INTERVAL_NAVIGATION_VEHICLE_MS,
            Self::NavigatingBicycle => INTERVAL_NAVIGATION_BICYCLE_MS,
            Self::NavigatingPedestrian => INTERVAL_NAVIGATION_PEDESTRIAN_MS,
            Self::NavigatingTransit => INTERVAL_NAVIGATION_TRANSIT_MS,
        };
        Duration::from_millis(ms)
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFollowing => write!(f, "not-following"),
            Self::Follow => write!(f, "follow"),
            Self::FollowAndRotate => write!(f, "follow-and-rotate"),
            Self::NavigatingVehicle => write!(f, "navigating-vehicle"),
            Self::NavigatingBicycle => write!(f, "navigating-bicycle"),
            Self::NavigatingPedestrian => write!(f, "navigating-pedestrian"),
            Self::NavigatingTransit => write!(f, "navigating-transit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_table() {
        assert_eq!(SessionMode::Follow.poll_interval(), Duration::from_millis(1000));
        assert_eq!(
            SessionMode::FollowAndRotate.poll_interval(),
            Duration::from_millis(3000)
        );
        assert_eq!(
            SessionMode::NotFollowing.poll_interval(),
            Duration::from_millis(3000)
        );
        assert_eq!(
            SessionMode::NavigatingVehicle.poll_interval(),
            Duration::from_millis(500)
        );
        assert_eq!(
            SessionMode::NavigatingBicycle.poll_interval(),
            Duration::from_millis(1000)
        );
        assert_eq!(
            SessionMode::NavigatingPedestrian.poll_interval(),
            Duration::from_millis(1000)
        );
        assert_eq!(
            SessionMode::NavigatingTransit.poll_interval(),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_is_navigating() {
        assert!(SessionMode::NavigatingVehicle.is_navigating());
        assert!(SessionMode::NavigatingTransit.is_navigating());
        assert!(!SessionMode::Follow.is_navigating());
        assert!(!SessionMode::NotFollowing.is_navigating());
    }
}
