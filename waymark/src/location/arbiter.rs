//! Fix quality arbiter - decides whether a candidate fix supersedes the last
//! accepted one.
//!
//! This is a pure decision function: no I/O, no state beyond the two fixes
//! and the provider trust flag passed in.
//!
//! # Selection Logic
//!
//! 1. A non-GPS fix without a usable accuracy is rejected outright; GPS-class
//!    fixes get an accuracy waiver (some chipsets omit it on good fixes).
//! 2. The first fix is always accepted.
//! 3. If the last fix was a degenerate GPS fix (no accuracy), anything
//!    replaces it.
//! 4. A trusted (fused) candidate bypasses the comparison entirely.
//! 5. Otherwise the last fix's accuracy is decayed by elapsed time and
//!    estimated speed, and the candidate wins iff its own accuracy beats the
//!    decayed value. The longer since the last fix and the faster we might be
//!    moving, the more the old precision is discounted.

use super::fix::Fix;

/// Speed floor for the decay computation, meters per second.
///
/// Assumes at least walking-to-jogging motion so stale fixes decay even when
/// the hardware reports no speed.
const MIN_DECAY_SPEED_MPS: f64 = 5.0;

/// Whether the candidate's accuracy passes the entry check.
///
/// GPS-class fixes are considered satisfied unconditionally; everything else
/// must carry a positive finite accuracy.
fn accuracy_satisfied(fix: &Fix) -> bool {
    fix.provider.is_gps_class() || fix.has_accuracy()
}

/// Decide whether `candidate` supersedes `last`.
///
/// `candidate_bypasses_arbitration` is true only when the active provider
/// trusts fused fixes *and* the candidate itself came from the fused
/// provider; such fixes skip the decayed-accuracy comparison. A non-fused
/// candidate never gets the bypass, even against a fused last fix.
pub fn accept_fix(candidate: &Fix, last: Option<&Fix>, candidate_bypasses_arbitration: bool) -> bool {
    if !accuracy_satisfied(candidate) {
        return false;
    }

    let Some(last) = last else {
        return true;
    };

    // The prior fix was already degenerate - anything is an improvement.
    if last.provider.is_gps_class() && !last.has_accuracy() {
        return true;
    }

    if candidate_bypasses_arbitration {
        return true;
    }

    let speed = ((candidate.speed_mps.unwrap_or(0.0) + last.speed_mps.unwrap_or(0.0)) / 2.0)
        .max(MIN_DECAY_SPEED_MPS);
    let elapsed_s = candidate.timestamp_ms.abs_diff(last.timestamp_ms) as f64 / 1000.0;
    let decayed_last_accuracy = last.accuracy_m.unwrap_or(0.0) + speed * elapsed_s;

    // A GPS candidate without accuracy compares as zero here, i.e. it wins
    // against any decayed value - matching OS APIs that report 0 for unknown.
    candidate.accuracy_m.unwrap_or(0.0) < decayed_last_accuracy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::fix::ProviderTag;

    fn gps(t_ms: u64, accuracy: f64) -> Fix {
        Fix::new(ProviderTag::NativeGps, t_ms, 53.5, 10.0).with_accuracy(accuracy)
    }

    fn network(t_ms: u64, accuracy: f64) -> Fix {
        Fix::new(ProviderTag::NativeNetwork, t_ms, 53.5, 10.0).with_accuracy(accuracy)
    }

    fn fused(t_ms: u64, accuracy: f64) -> Fix {
        Fix::new(ProviderTag::Fused, t_ms, 53.5, 10.0).with_accuracy(accuracy)
    }

    #[test]
    fn test_first_fix_accepted() {
        assert!(accept_fix(&gps(0, 10.0), None, false));
        assert!(accept_fix(&network(0, 50.0), None, false));
    }

    #[test]
    fn test_non_gps_without_accuracy_rejected() {
        let no_accuracy = Fix::new(ProviderTag::NativeNetwork, 0, 53.5, 10.0);
        assert!(!accept_fix(&no_accuracy, None, false));

        let fused_no_accuracy = Fix::new(ProviderTag::Fused, 0, 53.5, 10.0);
        assert!(!accept_fix(&fused_no_accuracy, None, true));
    }

    #[test]
    fn test_gps_without_accuracy_always_accepted_as_candidate() {
        let candidate = Fix::new(ProviderTag::NativeGps, 5_000, 53.5, 10.0);
        assert!(accept_fix(&candidate, None, false));
        assert!(accept_fix(&candidate, Some(&gps(0, 3.0)), false));
        assert!(accept_fix(&candidate, Some(&fused(0, 3.0)), false));
    }

    #[test]
    fn test_degenerate_gps_last_replaced_unconditionally() {
        let degenerate = Fix::new(ProviderTag::NativeGps, 0, 53.5, 10.0);

        // Even a much worse network fix replaces it, with no time elapsed.
        assert!(accept_fix(&network(0, 500.0), Some(&degenerate), false));
    }

    #[test]
    fn test_fused_bypass() {
        // 100m fused candidate against a fresh 5m GPS fix: the comparison
        // would reject it, the bypass accepts it.
        let last = gps(0, 5.0);
        let candidate = fused(0, 100.0);
        assert!(!accept_fix(&candidate, Some(&last), false));
        assert!(accept_fix(&candidate, Some(&last), true));
    }

    #[test]
    fn test_monotonic_decay_concrete_case() {
        // last = 10m at t=0, candidate = 20m at t=5s, both stationary:
        // decayed = 10 + 5*5 = 35, and 20 < 35 -> accepted.
        let last = gps(0, 10.0);
        let candidate = gps(5_000, 20.0);
        assert!(accept_fix(&candidate, Some(&last), false));
    }

    #[test]
    fn test_worse_fix_rejected_when_fresh() {
        // Same instant: decayed = 10 + 5*0 = 10, and 20 >= 10 -> rejected.
        let last = gps(0, 10.0);
        let candidate = gps(0, 20.0);
        assert!(!accept_fix(&candidate, Some(&last), false));
    }

    #[test]
    fn test_equal_accuracy_rejected_without_elapsed_time() {
        let last = gps(0, 10.0);
        let candidate = gps(0, 10.0);
        assert!(!accept_fix(&candidate, Some(&last), false));
    }

    #[test]
    fn test_reported_speed_widens_decay() {
        // Average speed 20 m/s over 2s: decayed = 10 + 40 = 50.
        let last = gps(0, 10.0).with_speed(20.0);
        let candidate = gps(2_000, 45.0).with_speed(20.0);
        assert!(accept_fix(&candidate, Some(&last), false));

        // Stationary over the same window: decayed = 10 + 10 = 20.
        let last = gps(0, 10.0);
        let candidate = gps(2_000, 45.0);
        assert!(!accept_fix(&candidate, Some(&last), false));
    }

    #[test]
    fn test_elapsed_time_is_absolute() {
        // Candidate stamped *before* the last fix by a skewed provider clock
        // still decays the last accuracy.
        let last = gps(5_000, 10.0);
        let candidate = gps(0, 20.0);
        assert!(accept_fix(&candidate, Some(&last), false));
    }

    #[test]
    fn test_non_fused_candidate_must_beat_fused_last() {
        // A fresh fused 8m fix is not displaced by a worse network fix...
        let last = fused(0, 8.0);
        assert!(!accept_fix(&network(0, 30.0), Some(&last), false));

        // ...but the general decay rule still applies after enough time.
        assert!(accept_fix(&network(10_000, 30.0), Some(&last), false));
    }
}
