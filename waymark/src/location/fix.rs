//! Core fix types for location acquisition.
//!
//! A [`Fix`] is one immutable positioning reading as delivered by a
//! provider: timestamp, coordinates, and whatever optional quality data the
//! hardware reported. Unknown values are `None`, never sentinel zeros - an
//! accuracy of `Some(0.0)` from the OS means "unknown" and is normalized to
//! `None` on construction.

/// Which positioning source produced a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderTag {
    /// Satellite fix from the OS GPS provider.
    NativeGps,
    /// Cell/Wi-Fi fix from the OS network provider.
    NativeNetwork,
    /// Fix from the vendor fused provider.
    Fused,
    /// Dead-reckoned fix predicted by the map core.
    Predicted,
}

impl ProviderTag {
    /// GPS-class fixes may omit accuracy and are still considered good
    /// (hardware quirk on several chipsets).
    #[inline]
    pub fn is_gps_class(&self) -> bool {
        matches!(self, Self::NativeGps)
    }
}

impl std::fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NativeGps => write!(f, "gps"),
            Self::NativeNetwork => write!(f, "network"),
            Self::Fused => write!(f, "fused"),
            Self::Predicted => write!(f, "predicted"),
        }
    }
}

/// One positioning reading.
///
/// Created by a provider, judged by the arbiter, and retained only as the
/// session's single "last accepted fix" slot - there is no history buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    /// When this fix was measured, epoch milliseconds (provider clock).
    pub timestamp_ms: u64,

    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Horizontal accuracy radius in meters. `None` if the provider did not
    /// report one; never zero or negative.
    pub accuracy_m: Option<f64>,

    /// Ground speed in meters per second.
    pub speed_mps: Option<f64>,

    /// Bearing in degrees (0-360).
    pub bearing_deg: Option<f64>,

    /// Altitude above sea level in meters.
    pub altitude_m: Option<f64>,

    /// Source of this fix.
    pub provider: ProviderTag,
}

impl Fix {
    /// Create a bare fix with no quality data.
    pub fn new(provider: ProviderTag, timestamp_ms: u64, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp_ms,
            latitude,
            longitude,
            accuracy_m: None,
            speed_mps: None,
            bearing_deg: None,
            altitude_m: None,
            provider,
        }
    }

    /// Set the accuracy, normalizing non-finite or non-positive readings to
    /// unknown.
    pub fn with_accuracy(mut self, meters: f64) -> Self {
        self.accuracy_m = (meters.is_finite() && meters > 0.0).then_some(meters);
        self
    }

    /// Set the ground speed.
    pub fn with_speed(mut self, mps: f64) -> Self {
        self.speed_mps = mps.is_finite().then_some(mps);
        self
    }

    /// Set the bearing.
    pub fn with_bearing(mut self, degrees: f64) -> Self {
        self.bearing_deg = degrees.is_finite().then_some(degrees);
        self
    }

    /// Set the altitude.
    pub fn with_altitude(mut self, meters: f64) -> Self {
        self.altitude_m = meters.is_finite().then_some(meters);
        self
    }

    /// Whether the provider reported a usable accuracy for this fix.
    #[inline]
    pub fn has_accuracy(&self) -> bool {
        self.accuracy_m.is_some()
    }
}

/// Current wall-clock time as epoch milliseconds.
///
/// Real providers stamp fixes with their own hardware clock; this is for
/// simulated feeds and tests.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
