//! Provider contract shared by all positioning sources.
//!
//! A provider wraps one concrete positioning SDK and reports through a
//! four-message channel contract: fixes, a settings-resolution request, a
//! "no usable source" signal, or a vendor connection failure. The session
//! never talks to an SDK directly - it only starts/stops providers and
//! consumes [`ProviderEvent`]s from the channel.
//!
//! One small closed trait covers both variants; there is no callback
//! interface hierarchy.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::fix::Fix;

/// Which concrete provider variant is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Plain OS location provider.
    Native,
    /// Vendor fused provider.
    Fused,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Fused => write!(f, "fused"),
        }
    }
}

/// Opaque platform token for a "settings must be changed" resolution flow.
///
/// The permission gateway hands this back to the OS to present its dialog;
/// the core only transports it.
#[derive(Debug, Clone)]
pub struct ResolutionIntent {
    /// Platform-specific action identifier.
    pub action: String,
}

impl ResolutionIntent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }
}

/// Everything a provider can report.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// A raw positioning reading.
    FixReceived(Fix),
    /// Location settings need user action before fixes can flow.
    ResolutionRequired(ResolutionIntent),
    /// No usable positioning source on this device/configuration.
    Disabled,
    /// Vendor service unreachable; the session downgrades to the native
    /// provider.
    ConnectionFailed,
}

/// Sender half of the provider event channel, handed to providers at
/// construction.
pub type ProviderEventSender = mpsc::UnboundedSender<ProviderEvent>;

/// Receiver half, consumed by the session's event pump.
pub type ProviderEventReceiver = mpsc::UnboundedReceiver<ProviderEvent>;

/// Create the provider event channel.
pub fn event_channel() -> (ProviderEventSender, ProviderEventReceiver) {
    mpsc::unbounded_channel()
}

/// Contract implemented by every provider variant.
pub trait LocationProvider: Send + Sync {
    /// Begin emitting fixes at approximately `poll_interval`.
    ///
    /// No-op if already active.
    fn start(&self, poll_interval: Duration);

    /// Stop emission. No-op if inactive. No fix is emitted after this
    /// returns; any reading racing the stop is discarded by the session.
    fn stop(&self);

    /// Whether the provider is currently polling.
    fn is_active(&self) -> bool;

    /// Whether this provider's fixes may bypass the quality arbiter.
    ///
    /// True only for the vendor fused provider.
    fn trusts_bypass_arbitration(&self) -> bool;

    /// Which variant this is.
    fn kind(&self) -> ProviderKind;
}

/// One poll of the underlying positioning feed.
#[derive(Debug, Clone)]
pub enum SourcePoll {
    /// A reading is available.
    Fix(Fix),
    /// Nothing yet; keep polling.
    Pending,
    /// The feed needs a settings change before it can produce fixes.
    ResolutionRequired(ResolutionIntent),
    /// The feed reports no usable source.
    Disabled,
    /// The feed lost its backing service connection.
    ConnectionLost,
}

/// Boundary over the concrete positioning feed a provider wraps.
///
/// Real implementations sit on top of an OS location manager or a vendor
/// SDK; tests and the CLI use scripted feeds.
pub trait FixSource: Send + Sync {
    /// Establish the backing service connection.
    ///
    /// Plain OS feeds have nothing to connect and keep the default.
    fn connect(&self) -> bool {
        true
    }

    /// Poll the feed once.
    fn poll_fix(&self) -> SourcePoll;
}

/// Shared polling loop for both provider variants.
///
/// Ticks at `poll_interval`, forwards feed output into the event channel,
/// and exits on cancellation, on a terminal feed condition, or when the
/// receiving session is gone. The token is re-checked right before every
/// send so nothing is emitted once `stop()` has cancelled it.
pub(crate) async fn run_poll_loop(
    kind: ProviderKind,
    source: std::sync::Arc<dyn FixSource>,
    events: ProviderEventSender,
    token: CancellationToken,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if token.is_cancelled() || events.is_closed() {
            break;
        }

        match source.poll_fix() {
            SourcePoll::Fix(fix) => {
                if token.is_cancelled() {
                    break;
                }
                if events.send(ProviderEvent::FixReceived(fix)).is_err() {
                    debug!(provider = %kind, "event channel closed, stopping provider loop");
                    break;
                }
            }
            SourcePoll::Pending => {}
            SourcePoll::ResolutionRequired(intent) => {
                let _ = events.send(ProviderEvent::ResolutionRequired(intent));
            }
            SourcePoll::Disabled => {
                let _ = events.send(ProviderEvent::Disabled);
                token.cancel();
                break;
            }
            SourcePoll::ConnectionLost => {
                let _ = events.send(ProviderEvent::ConnectionFailed);
                token.cancel();
                break;
            }
        }
    }

    debug!(provider = %kind, "provider poll loop stopped");
}
