//! Bounded waiting primitives.
//!
//! Every wait on an external party is either a deadline on a single call
//! ([`with_deadline`]) or a bounded poll with backoff ([`poll_until`]).

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::provider::ProviderError;

/// Shape of a bounded poll: `attempts` checks, each preceded by a delay that
/// doubles from `initial_delay` up to `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl PollPolicy {
    /// Delay before the given zero-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Upper bound on the time spent sleeping.
    pub fn total_wait(&self) -> Duration {
        (0..self.attempts).map(|a| self.delay_for(a)).sum()
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(1_000),
        }
    }
}

/// Sleeps, then checks, up to `policy.attempts` times.
///
/// Returns the first `Some` the check yields, or `None` when attempts run
/// out or `cancel` fires.
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut check: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 0..policy.attempts {
        let delay = policy.delay_for(attempt);
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(attempt, "poll cancelled");
                return None;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        if let Some(found) = check().await {
            debug!(attempt, "poll satisfied");
            return Some(found);
        }
    }

    debug!(attempts = policy.attempts, "poll exhausted");
    None
}

/// Runs one provider call under a deadline.
pub async fn with_deadline<T, Fut>(limit: Duration, call: Fut) -> Result<T, ProviderError>
where
    Fut: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(
            u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> PollPolicy {
        PollPolicy {
            attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        }
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let p = policy();
        assert_eq!(p.delay_for(0), Duration::from_millis(100));
        assert_eq!(p.delay_for(1), Duration::from_millis(200));
        assert_eq!(p.delay_for(2), Duration::from_millis(300));
        assert_eq!(p.delay_for(40), Duration::from_millis(300));
        assert_eq!(p.total_wait(), Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_hit() {
        let calls = AtomicU32::new(0);
        let found = poll_until(&policy(), &CancellationToken::new(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { (n == 2).then_some(n) }
        })
        .await;

        assert_eq!(found, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let found: Option<()> = poll_until(&policy(), &CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { None }
        })
        .await;

        assert!(found.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let waited = started.elapsed();
        assert!(waited >= policy().total_wait());
        assert!(waited < policy().total_wait() + Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_poll() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let calls = AtomicU32::new(0);
        let found: Option<()> = poll_until(&policy(), &cancel, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { None }
        })
        .await;

        assert!(found.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_times_out_stalled_call() {
        let result: Result<(), _> = with_deadline(
            Duration::from_millis(250),
            std::future::pending::<Result<(), ProviderError>>(),
        )
        .await;
        assert_eq!(result, Err(ProviderError::Timeout(250)));
    }

    #[tokio::test]
    async fn deadline_passes_through_results() {
        let ok = with_deadline(Duration::from_secs(1), async { Ok::<_, ProviderError>(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u8, _> = with_deadline(Duration::from_secs(1), async {
            Err(ProviderError::Malformed("x".into()))
        })
        .await;
        assert!(matches!(err, Err(ProviderError::Malformed(_))));
    }
}
