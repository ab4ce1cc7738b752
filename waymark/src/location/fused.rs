//! Vendor fused location provider.
//!
//! Wraps a vendor positioning SDK that multiplexes GPS, Wi-Fi and cell data
//! behind one feed. Its fixes are trusted to bypass the quality arbiter.
//! The backing service must be connected before polling; a failed connect is
//! reported as `ConnectionFailed`, which the session answers with a one-way
//! downgrade to the native provider.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::provider::{
    run_poll_loop, FixSource, LocationProvider, ProviderEvent, ProviderEventSender, ProviderKind,
};

/// Location provider backed by the vendor fused feed.
pub struct FusedProvider {
    source: Arc<dyn FixSource>,
    events: ProviderEventSender,
    token: Mutex<Option<CancellationToken>>,
}

impl FusedProvider {
    /// Create a provider over the given feed, reporting into `events`.
    pub fn new(source: Arc<dyn FixSource>, events: ProviderEventSender) -> Self {
        Self {
            source,
            events,
            token: Mutex::new(None),
        }
    }
}

impl LocationProvider for FusedProvider {
    fn start(&self, poll_interval: Duration) {
        let Ok(mut slot) = self.token.lock() else {
            return;
        };
        if slot.as_ref().is_some_and(|t| !t.is_cancelled()) {
            warn!("fused provider already started");
            return;
        }

        let token = CancellationToken::new();
        *slot = Some(token.clone());

        info!(interval_ms = poll_interval.as_millis() as u64, "starting fused provider");
        let source = Arc::clone(&self.source);
        let events = self.events.clone();
        tokio::spawn(async move {
            if !source.connect() {
                warn!("fused service connection failed");
                let _ = events.send(ProviderEvent::ConnectionFailed);
                token.cancel();
                return;
            }
            run_poll_loop(ProviderKind::Fused, source, events, token, poll_interval).await;
        });
    }

    fn stop(&self) {
        let Ok(mut slot) = self.token.lock() else {
            return;
        };
        match slot.take() {
            Some(token) => {
                info!("stopping fused provider");
                token.cancel();
            }
            None => warn!("fused provider already stopped"),
        }
    }

    fn is_active(&self) -> bool {
        self.token
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|t| !t.is_cancelled()))
            .unwrap_or(false)
    }

    fn trusts_bypass_arbitration(&self) -> bool {
        true
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Fused
    }
}
