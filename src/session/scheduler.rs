/// Single-timer refresh scheduling.
///
/// At most one timer is pending per session: arming a new one aborts the
/// previous task. The timer task itself only holds a weak reference to the
/// session, so dropping the session also retires its timer.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Computes how long to wait before the next refresh.
///
/// Tokens inside the minimum-lifetime window refresh after the short fixed
/// delay (capped at the remaining lifetime, so the delay never outlives the
/// token); everything else waits until the window opens.
pub fn compute_refresh_delay(
    remaining: Duration,
    min_lifetime_threshold: Duration,
    near_expiry_delay: Duration,
) -> Duration {
    if remaining <= min_lifetime_threshold {
        near_expiry_delay.min(remaining)
    } else {
        remaining - min_lifetime_threshold
    }
}

#[derive(Default)]
pub struct RefreshScheduler {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    /// Arms the timer, replacing any pending one.
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.handle.lock().unwrap();
        if let Some(previous) = guard.take() {
            previous.abort();
        }
        *guard = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    /// Cancels the pending timer if any. Idempotent.
    pub fn cancel(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }

    pub fn has_pending(&self) -> bool {
        self.handle
            .lock()
            .unwrap()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TEN_MINUTES: Duration = Duration::from_secs(600);
    const THIRTY_SECONDS: Duration = Duration::from_secs(30);

    #[test]
    fn long_lived_token_waits_until_threshold() {
        let remaining = Duration::from_secs(3600);
        let delay = compute_refresh_delay(remaining, TEN_MINUTES, THIRTY_SECONDS);
        assert_eq!(delay, Duration::from_secs(3000));
    }

    #[test]
    fn near_expiry_token_uses_short_delay() {
        let remaining = Duration::from_secs(300); // 5 minutes left
        let delay = compute_refresh_delay(remaining, TEN_MINUTES, THIRTY_SECONDS);
        assert_eq!(delay, THIRTY_SECONDS);
    }

    #[test]
    fn delay_never_exceeds_remaining_lifetime() {
        for remaining_secs in [0u64, 5, 29, 30, 31, 599, 600, 601, 86400] {
            let remaining = Duration::from_secs(remaining_secs);
            let delay = compute_refresh_delay(remaining, TEN_MINUTES, THIRTY_SECONDS);
            assert!(delay <= remaining, "delay {:?} > remaining {:?}", delay, remaining);
        }
    }

    #[test]
    fn expired_token_refreshes_immediately() {
        let delay = compute_refresh_delay(Duration::ZERO, TEN_MINUTES, THIRTY_SECONDS);
        assert_eq!(delay, Duration::ZERO);
    }

    #[tokio::test]
    async fn scheduling_replaces_pending_timer() {
        let scheduler = RefreshScheduler::default();
        let fired = Arc::new(AtomicUsize::new(0));

        let first = fired.clone();
        scheduler.schedule(Duration::from_millis(50), async move {
            first.fetch_add(1, Ordering::SeqCst);
        });

        let second = fired.clone();
        scheduler.schedule(Duration::from_millis(20), async move {
            second.fetch_add(10, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(120)).await;
        // Only the replacement fired
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn cancel_prevents_firing_and_is_idempotent() {
        let scheduler = RefreshScheduler::default();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        scheduler.schedule(Duration::from_millis(30), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.has_pending());

        scheduler.cancel();
        scheduler.cancel();
        assert!(!scheduler.has_pending());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
