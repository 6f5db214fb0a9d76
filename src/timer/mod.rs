//! Deadline Timer
//!
//! Schedules a single cancellable close signal for a poll. Cancellation is
//! best-effort: a callback that is already running cannot be recalled, so
//! the receiver must re-check the poll ID and session state under its own
//! lock before acting. That identity check, not cancellation, is the
//! authoritative guard against a stale fire.

use std::time::Duration;

use tokio::task::JoinHandle;
use uuid::Uuid;

/// Handle to an armed deadline. Dropping the handle does not cancel it.
#[derive(Debug)]
pub struct TimerHandle {
    poll_id: Uuid,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// The poll this deadline belongs to.
    pub fn poll_id(&self) -> Uuid {
        self.poll_id
    }

    /// Best-effort cancellation. A no-op if the callback already fired or is
    /// concurrently firing.
    pub fn cancel(self) {
        self.task.abort();
    }
}

/// Arm a deadline: after `duration`, invoke `on_deadline(poll_id)` once.
pub fn arm<F>(poll_id: Uuid, duration: Duration, on_deadline: F) -> TimerHandle
where
    F: FnOnce(Uuid) + Send + 'static,
{
    let task = tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        on_deadline(poll_id);
    });
    TimerHandle { poll_id, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_duration() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let poll_id = Uuid::new_v4();

        let handle = arm(poll_id, Duration::from_secs(30), move |id| {
            assert_eq!(id, poll_id);
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(handle.poll_id(), poll_id);

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_fire() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        let handle = arm(Uuid::new_v4(), Duration::from_secs(30), move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_is_noop() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        let handle = arm(Uuid::new_v4(), Duration::from_secs(1), move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Fired already; cancelling must not panic or un-fire.
        handle.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
