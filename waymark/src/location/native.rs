//! Plain OS location provider.
//!
//! Wraps the operating system's own positioning feed. Fixes from this
//! provider always go through the quality arbiter - the OS provider gets no
//! trust shortcut.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::provider::{
    run_poll_loop, FixSource, LocationProvider, ProviderEventSender, ProviderKind,
};

/// Location provider backed by the plain OS feed.
pub struct NativeProvider {
    source: Arc<dyn FixSource>,
    events: ProviderEventSender,
    token: Mutex<Option<CancellationToken>>,
}

impl NativeProvider {
    /// Create a provider over the given feed, reporting into `events`.
    pub fn new(source: Arc<dyn FixSource>, events: ProviderEventSender) -> Self {
        Self {
            source,
            events,
            token: Mutex::new(None),
        }
    }
}

impl LocationProvider for NativeProvider {
    fn start(&self, poll_interval: Duration) {
        let Ok(mut slot) = self.token.lock() else {
            return;
        };
        if slot.as_ref().is_some_and(|t| !t.is_cancelled()) {
            warn!("native provider already started");
            return;
        }

        let token = CancellationToken::new();
        *slot = Some(token.clone());

        info!(interval_ms = poll_interval.as_millis() as u64, "starting native provider");
        let source = Arc::clone(&self.source);
        let events = self.events.clone();
        tokio::spawn(run_poll_loop(
            ProviderKind::Native,
            source,
            events,
            token,
            poll_interval,
        ));
    }

    fn stop(&self) {
        let Ok(mut slot) = self.token.lock() else {
            return;
        };
        match slot.take() {
            Some(token) => {
                info!("stopping native provider");
                token.cancel();
            }
            None => warn!("native provider already stopped"),
        }
    }

    fn is_active(&self) -> bool {
        self.token
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|t| !t.is_cancelled()))
            .unwrap_or(false)
    }

    fn trusts_bypass_arbitration(&self) -> bool {
        false
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Native
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::fix::{Fix, ProviderTag};
    use crate::location::provider::{event_channel, ProviderEvent, SourcePoll};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Feed producing a numbered GPS fix per poll.
    struct CountingFeed {
        polls: AtomicU64,
    }

    impl CountingFeed {
        fn new() -> Self {
            Self {
                polls: AtomicU64::new(0),
            }
        }
    }

    impl FixSource for CountingFeed {
        fn poll_fix(&self) -> SourcePoll {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            SourcePoll::Fix(
                Fix::new(ProviderTag::NativeGps, n, 53.5, 10.0).with_accuracy(10.0),
            )
        }
    }

    struct DisabledFeed;

    impl FixSource for DisabledFeed {
        fn poll_fix(&self) -> SourcePoll {
            SourcePoll::Disabled
        }
    }

    #[tokio::test]
    async fn test_emits_fixes_until_stopped() {
        let (tx, mut rx) = event_channel();
        let provider = NativeProvider::new(Arc::new(CountingFeed::new()), tx);

        provider.start(Duration::from_millis(5));
        assert!(provider.is_active());

        let event = rx.recv().await.expect("should receive an event");
        assert!(matches!(event, ProviderEvent::FixReceived(_)));

        provider.stop();
        assert!(!provider.is_active());

        // Drain whatever raced the stop, then confirm silence.
        tokio::time::sleep(Duration::from_millis(30)).await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(rx.try_recv().is_err(), "no fix may arrive after stop");
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (tx, _rx) = event_channel();
        let provider = NativeProvider::new(Arc::new(CountingFeed::new()), tx);

        provider.start(Duration::from_millis(50));
        provider.start(Duration::from_millis(50));
        assert!(provider.is_active());

        provider.stop();
        provider.stop();
        assert!(!provider.is_active());
    }

    #[tokio::test]
    async fn test_disabled_feed_reports_and_deactivates() {
        let (tx, mut rx) = event_channel();
        let provider = NativeProvider::new(Arc::new(DisabledFeed), tx);

        provider.start(Duration::from_millis(5));
        let event = rx.recv().await.expect("should receive an event");
        assert!(matches!(event, ProviderEvent::Disabled));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!provider.is_active());
    }

    #[tokio::test]
    async fn test_native_provider_has_no_trust_shortcut() {
        let (tx, _rx) = event_channel();
        let provider = NativeProvider::new(Arc::new(CountingFeed::new()), tx);

        assert!(!provider.trusts_bypass_arbitration());
        assert_eq!(provider.kind(), ProviderKind::Native);
    }
}
