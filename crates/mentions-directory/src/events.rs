//! Signals sent from the directory to the host (editor layer).

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::client::Resource;
use crate::clock::Clock;

/// Minimum seconds between two invalid-credentials notifications.
pub const INVALID_CREDENTIALS_THROTTLE_SECS: i64 = 60;

/// Broadcast channel capacity for directory events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Event delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEvent {
    /// The remote rejected the token (401/403). Throttled.
    InvalidCredentials,
    /// A refresh installed a new listing.
    Refreshed { count: usize, resource: Resource },
    /// A refresh produced nothing; the previous listing was kept.
    RefreshFailed { resource: Option<Resource> },
    /// The cache was cleared on request.
    Cleared,
}

/// Fan-out of [`DirectoryEvent`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DirectoryEvents {
    tx: broadcast::Sender<DirectoryEvent>,
}

impl DirectoryEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: DirectoryEvent) {
        if self.tx.send(event).is_err() {
            trace!("no subscribers for directory event");
        }
    }
}

impl Default for DirectoryEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// `last_notified_at` before the first notification.
const NEVER_NOTIFIED: i64 = i64::MIN;

/// Process-scoped throttle for invalid-credentials notifications.
///
/// Created once by the host and shared by every client. The timestamp is a
/// plain load/store pair; a concurrent race may produce one extra or one
/// missed notification within the window.
pub struct CredentialAlarm {
    last_notified_at: AtomicI64,
    clock: Arc<dyn Clock>,
    events: DirectoryEvents,
}

impl CredentialAlarm {
    pub fn new(clock: Arc<dyn Clock>, events: DirectoryEvents) -> Self {
        Self {
            last_notified_at: AtomicI64::new(NEVER_NOTIFIED),
            clock,
            events,
        }
    }

    /// Record an authorization failure. Emits
    /// [`DirectoryEvent::InvalidCredentials`] unless one went out within the
    /// last [`INVALID_CREDENTIALS_THROTTLE_SECS`]. Returns whether it emitted.
    pub fn trip(&self) -> bool {
        let now = self.clock.now();
        let last = self.last_notified_at.load(Ordering::Relaxed);
        if last != NEVER_NOTIFIED && now.saturating_sub(last) < INVALID_CREDENTIALS_THROTTLE_SECS {
            return false;
        }
        self.last_notified_at.store(now, Ordering::Relaxed);
        warn!("GitLab token is not valid");
        self.events.emit(DirectoryEvent::InvalidCredentials);
        true
    }
}

impl std::fmt::Debug for CredentialAlarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialAlarm")
            .field(
                "last_notified_at",
                &self.last_notified_at.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_alarm_throttles_within_window() {
        let clock = Arc::new(ManualClock::new(10_000));
        let events = DirectoryEvents::new();
        let mut rx = events.subscribe();
        let alarm = CredentialAlarm::new(clock.clone(), events);

        assert!(alarm.trip());
        clock.advance(30);
        assert!(!alarm.trip());
        clock.advance(29);
        assert!(!alarm.trip());
        clock.advance(1);
        assert!(alarm.trip());

        assert_eq!(rx.try_recv().unwrap(), DirectoryEvent::InvalidCredentials);
        assert_eq!(rx.try_recv().unwrap(), DirectoryEvent::InvalidCredentials);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_alarm_throttles_from_epoch_zero() {
        let clock = Arc::new(ManualClock::new(0));
        let events = DirectoryEvents::new();
        let mut rx = events.subscribe();
        let alarm = CredentialAlarm::new(clock.clone(), events);

        assert!(alarm.trip());
        clock.advance(1);
        assert!(!alarm.trip());
        clock.advance(59);
        assert!(alarm.trip());

        assert_eq!(rx.try_recv().unwrap(), DirectoryEvent::InvalidCredentials);
        assert_eq!(rx.try_recv().unwrap(), DirectoryEvent::InvalidCredentials);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        DirectoryEvents::new().emit(DirectoryEvent::Cleared);
    }
}
