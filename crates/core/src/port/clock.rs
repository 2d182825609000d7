// Clock Port (for testability)
// Owns both wall-clock reads and timer sleeps so that timeout logic can be
// driven deterministically from tests. A timer is just a `sleep` future;
// dropping it cancels the timer.

use async_trait::async_trait;

/// Clock interface (allows mocking in tests)
#[async_trait]
pub trait Clock: Send + Sync {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> i64;

    /// Resolve after `ms` milliseconds of clock time
    async fn sleep(&self, ms: u64);
}

/// System clock (production)
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    async fn sleep(&self, ms: u64) {
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    struct Sleeper {
        deadline: i64,
        notify: Arc<Notify>,
    }

    /// Manually advanced clock. Sleeping tasks block until `advance` moves
    /// time past their deadline; no real time passes.
    pub struct ManualClock {
        now: Mutex<i64>,
        sleepers: Mutex<Vec<Sleeper>>,
    }

    impl ManualClock {
        pub fn new(start_millis: i64) -> Self {
            Self {
                now: Mutex::new(start_millis),
                sleepers: Mutex::new(Vec::new()),
            }
        }

        /// Move time forward, waking every sleeper whose deadline has passed
        pub fn advance(&self, delta_ms: i64) {
            let now = {
                let mut now = self.now.lock().unwrap();
                *now += delta_ms;
                *now
            };
            let mut sleepers = self.sleepers.lock().unwrap();
            for sleeper in sleepers.iter() {
                if sleeper.deadline <= now {
                    sleeper.notify.notify_one();
                }
            }
            sleepers.retain(|sleeper| sleeper.deadline > now);
        }

        /// Number of tasks currently blocked in `sleep`. Tests use this to
        /// wait until a spawned task has armed its timer before advancing.
        pub fn sleeper_count(&self) -> usize {
            self.sleepers.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn now_millis(&self) -> i64 {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, ms: u64) {
            if ms == 0 {
                return;
            }
            let notify = {
                let now = self.now.lock().unwrap();
                let notify = Arc::new(Notify::new());
                self.sleepers.lock().unwrap().push(Sleeper {
                    deadline: *now + ms as i64,
                    notify: notify.clone(),
                });
                notify
            };
            // Notify stores a permit, so an advance() racing ahead of this
            // await is not lost.
            notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::ManualClock;
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_manual_clock_reports_advanced_time() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.advance(250);
        assert_eq!(clock.now_millis(), 1_250);
    }

    #[tokio::test]
    async fn test_sleep_blocks_until_deadline() {
        let clock = Arc::new(ManualClock::new(0));

        let sleeper = {
            let clock = clock.clone();
            tokio::spawn(async move { clock.sleep(100).await })
        };

        while clock.sleeper_count() == 0 {
            tokio::task::yield_now().await;
        }

        // Not yet due: the task stays registered
        clock.advance(50);
        tokio::task::yield_now().await;
        assert_eq!(clock.sleeper_count(), 1);

        clock.advance(50);
        sleeper.await.unwrap();
        assert_eq!(clock.sleeper_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_sleep_returns_immediately() {
        let clock = ManualClock::new(0);
        clock.sleep(0).await;
        assert_eq!(clock.sleeper_count(), 0);
    }

    #[tokio::test]
    async fn test_advance_wakes_multiple_sleepers() {
        let clock = Arc::new(ManualClock::new(0));

        let short = {
            let clock = clock.clone();
            tokio::spawn(async move { clock.sleep(10).await })
        };
        let long = {
            let clock = clock.clone();
            tokio::spawn(async move { clock.sleep(500).await })
        };

        while clock.sleeper_count() < 2 {
            tokio::task::yield_now().await;
        }

        clock.advance(10);
        short.await.unwrap();
        assert_eq!(clock.sleeper_count(), 1);

        clock.advance(490);
        long.await.unwrap();
    }
}
