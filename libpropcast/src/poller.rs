//! Bounded readiness polling for asynchronous remote media
//!
//! [`MediaContainerPoller`] knows nothing about platforms. The calling adapter
//! supplies a check function that performs one status request and reports a
//! [`ContainerState`]; the poller decides when to ask again and when to give up.
//!
//! # Examples
//!
//! ```
//! use libpropcast::poller::{MediaContainerPoller, PollPolicy};
//! use libpropcast::types::ContainerState;
//!
//! # async fn example() -> libpropcast::error::PlatformResult<()> {
//! let poller = MediaContainerPoller::new(PollPolicy::immediate(3));
//! let outcome = poller
//!     .poll_until_ready(|_attempt| async { Ok(ContainerState::Ready) })
//!     .await?;
//! assert!(outcome.is_ready());
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::error::PlatformResult;
use crate::types::ContainerState;

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum number of status checks
    pub max_attempts: u32,
    /// Fixed delay between two checks
    pub interval: Duration,
    /// Upper bound of random extra delay added to each interval
    pub jitter: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Policy with no delay between checks
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Delay before the next check
    fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.interval;
        }
        let max_extra = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = rand::thread_rng().gen_range(0..=max_extra);
        self.interval.saturating_add(Duration::from_millis(extra))
    }
}

impl Default for PollPolicy {
    /// 10 checks, 2 seconds apart
    fn default() -> Self {
        Self::new(10, Duration::from_secs(2))
    }
}

/// How a polling loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Ready { attempts: u32 },
    /// The remote side reported a terminal failure
    Failed { attempts: u32 },
    /// Still pending when the attempt budget ran out
    Exhausted { attempts: u32 },
}

impl PollOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready { .. })
    }

    /// Number of status checks issued
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Ready { attempts }
            | PollOutcome::Failed { attempts }
            | PollOutcome::Exhausted { attempts } => *attempts,
        }
    }
}

/// Generic bounded poller
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaContainerPoller {
    policy: PollPolicy,
}

impl MediaContainerPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Call `check` until it reports `Ready` or `Failed`, or the budget is spent
    ///
    /// `check` receives the 1-based attempt number. It is called at most
    /// `max_attempts` times and there is no sleep after the last call.
    ///
    /// # Errors
    ///
    /// An error from `check` ends polling and is returned unchanged.
    pub async fn poll_until_ready<F, Fut>(&self, mut check: F) -> PlatformResult<PollOutcome>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = PlatformResult<ContainerState>>,
    {
        for attempt in 1..=self.policy.max_attempts {
            match check(attempt).await? {
                ContainerState::Ready => return Ok(PollOutcome::Ready { attempts: attempt }),
                ContainerState::Failed => return Ok(PollOutcome::Failed { attempts: attempt }),
                ContainerState::Pending => {
                    debug!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        "Container still pending"
                    );
                }
            }

            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.next_delay()).await;
            }
        }

        Ok(PollOutcome::Exhausted {
            attempts: self.policy.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Check function that replays a fixed script of states
    fn scripted(
        states: Vec<ContainerState>,
        calls: Arc<AtomicU32>,
    ) -> impl FnMut(u32) -> std::future::Ready<PlatformResult<ContainerState>> {
        move |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            let state = states
                .get(attempt as usize - 1)
                .copied()
                .unwrap_or(ContainerState::Pending);
            std::future::ready(Ok(state))
        }
    }

    #[tokio::test]
    async fn test_ready_on_first_check() {
        let calls = Arc::new(AtomicU32::new(0));
        let poller = MediaContainerPoller::new(PollPolicy::immediate(5));

        let outcome = poller
            .poll_until_ready(scripted(vec![ContainerState::Ready], calls.clone()))
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Ready { attempts: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ready_after_pending_checks() {
        let calls = Arc::new(AtomicU32::new(0));
        let poller = MediaContainerPoller::new(PollPolicy::immediate(5));
        let states = vec![
            ContainerState::Pending,
            ContainerState::Pending,
            ContainerState::Ready,
        ];

        let outcome = poller
            .poll_until_ready(scripted(states, calls.clone()))
            .await
            .unwrap();

        assert!(outcome.is_ready());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_state_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let poller = MediaContainerPoller::new(PollPolicy::immediate(10));
        let states = vec![ContainerState::Pending, ContainerState::Failed];

        let outcome = poller
            .poll_until_ready(scripted(states, calls.clone()))
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Failed { attempts: 2 });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_issues_exactly_max_attempts_checks() {
        let calls = Arc::new(AtomicU32::new(0));
        let poller = MediaContainerPoller::new(PollPolicy::immediate(7));

        let outcome = poller
            .poll_until_ready(scripted(vec![], calls.clone()))
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Exhausted { attempts: 7 });
        assert!(!outcome.is_ready());
        assert_eq!(calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_zero_attempts_never_checks() {
        let calls = Arc::new(AtomicU32::new(0));
        let poller = MediaContainerPoller::new(PollPolicy::immediate(0));

        let outcome = poller
            .poll_until_ready(scripted(vec![ContainerState::Ready], calls.clone()))
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Exhausted { attempts: 0 });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_check_error_propagates() {
        let poller = MediaContainerPoller::new(PollPolicy::immediate(5));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = poller
            .poll_until_ready(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(PlatformError::Network {
                        step: "container status",
                        message: "connection reset".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(PlatformError::Network { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_interval_between_checks_only() {
        let calls = Arc::new(AtomicU32::new(0));
        let poller = MediaContainerPoller::new(PollPolicy::new(3, Duration::from_secs(2)));

        let start = tokio::time::Instant::now();
        let outcome = poller
            .poll_until_ready(scripted(vec![], calls.clone()))
            .await
            .unwrap();

        assert_eq!(outcome.attempts(), 3);
        // Two sleeps between three checks, none after the last
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = PollPolicy::new(3, Duration::from_millis(100))
            .with_jitter(Duration::from_millis(50));
        for _ in 0..100 {
            let delay = policy.next_delay();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_huge_jitter_saturates_instead_of_wrapping() {
        let policy = PollPolicy::new(3, Duration::from_secs(1)).with_jitter(Duration::MAX);
        for _ in 0..10 {
            assert!(policy.next_delay() >= Duration::from_secs(1));
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.interval, Duration::from_secs(2));
        assert_eq!(policy.jitter, Duration::ZERO);
    }
}
