//! Timeout and retry decorator for Entity Store reads

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::EntityStore;
use crate::config::RetryConfig;
use crate::model::{Association, Collection, Profile};
use crate::{StoreError, StoreResult};

/// Bounded exponential backoff for idempotent reads
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    /// A single attempt: failures surface immediately
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `attempt + 1`
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        RetryPolicy::new(cfg.max_attempts)
            .with_initial_delay(Duration::from_millis(cfg.initial_delay_ms))
            .with_max_delay(Duration::from_millis(cfg.max_delay_ms))
    }
}

/// Wraps a backend so each read is bounded by `timeout` and retried per `policy`
///
/// Dropping the returned future cancels the in-flight read, so a caller's
/// own deadline reaches the backend as well.
pub struct BoundedStore<S> {
    inner: S,
    timeout: Duration,
    policy: RetryPolicy,
}

impl<S: EntityStore> BoundedStore<S> {
    pub fn new(inner: S, timeout: Duration, policy: RetryPolicy) -> Self {
        Self {
            inner,
            timeout,
            policy,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn guarded<T, F, Fut>(&self, operation: &'static str, mut call: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let attempts = self.policy.attempts();
        let mut attempt = 0;

        loop {
            let result = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(self.timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let delay = self.policy.compute_delay(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "store read failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<S: EntityStore> EntityStore for BoundedStore<S> {
    async fn find_associations_by_profile(
        &self,
        profile_id: &str,
    ) -> StoreResult<Vec<Association>> {
        self.guarded("find_associations_by_profile", || {
            self.inner.find_associations_by_profile(profile_id)
        })
        .await
    }

    async fn find_collections_by_ids(&self, ids: &[String]) -> StoreResult<Vec<Collection>> {
        self.guarded("find_collections_by_ids", || {
            self.inner.find_collections_by_ids(ids)
        })
        .await
    }

    async fn find_profile(&self, profile_id: &str) -> StoreResult<Option<Profile>> {
        self.guarded("find_profile", || self.inner.find_profile(profile_id))
            .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.guarded("ping", || self.inner.ping()).await
    }

    async fn close(&self) -> StoreResult<()> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockEntityStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails the first `failures` calls, then answers with one association
    struct FlakyStore {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl EntityStore for FlakyStore {
        async fn find_associations_by_profile(
            &self,
            profile_id: &str,
        ) -> StoreResult<Vec<Association>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            Ok(vec![Association::new("a1", profile_id, "c1")])
        }

        async fn find_collections_by_ids(&self, _ids: &[String]) -> StoreResult<Vec<Collection>> {
            Ok(Vec::new())
        }

        async fn find_profile(&self, _profile_id: &str) -> StoreResult<Option<Profile>> {
            Ok(None)
        }

        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    struct SlowStore;

    #[async_trait]
    impl EntityStore for SlowStore {
        async fn find_associations_by_profile(
            &self,
            _profile_id: &str,
        ) -> StoreResult<Vec<Association>> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(Vec::new())
        }

        async fn find_collections_by_ids(&self, _ids: &[String]) -> StoreResult<Vec<Collection>> {
            Ok(Vec::new())
        }

        async fn find_profile(&self, _profile_id: &str) -> StoreResult<Option<Profile>> {
            Ok(None)
        }

        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    fn fast_retries(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts)
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
    }

    #[test]
    fn test_compute_delay_backs_off_and_caps() {
        let policy = RetryPolicy::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(300));

        assert_eq!(policy.compute_delay(0), Duration::from_millis(100));
        assert_eq!(policy.compute_delay(1), Duration::from_millis(200));
        assert_eq!(policy.compute_delay(2), Duration::from_millis(300));
        assert_eq!(policy.compute_delay(10), Duration::from_millis(300));
    }

    #[test]
    fn test_policy_from_config() {
        let cfg = RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 50,
            max_delay_ms: 400,
        };
        let policy = RetryPolicy::from(&cfg);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(50));
        assert_eq!(policy.max_delay, Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_default_policy_does_not_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let store = BoundedStore::new(
            FlakyStore {
                failures: 1,
                calls: calls.clone(),
            },
            Duration::from_secs(1),
            RetryPolicy::default(),
        );

        let result = store.find_associations_by_profile("p1").await;
        assert_eq!(
            result,
            Err(StoreError::Unavailable("connection reset".into()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let store = BoundedStore::new(
            FlakyStore {
                failures: 2,
                calls: calls.clone(),
            },
            Duration::from_secs(1),
            fast_retries(3),
        );

        let found = store.find_associations_by_profile("p1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let store = BoundedStore::new(
            FlakyStore {
                failures: 10,
                calls: calls.clone(),
            },
            Duration::from_secs(1),
            fast_retries(3),
        );

        assert!(store.find_associations_by_profile("p1").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalid_id_is_never_retried() {
        let mut mock = MockEntityStore::new();
        mock.expect_find_profile()
            .times(1)
            .returning(|id| Err(StoreError::InvalidId(id.to_string())));

        let store = BoundedStore::new(mock, Duration::from_secs(1), fast_retries(5));
        let result = store.find_profile("not-an-id").await;
        assert_eq!(result, Err(StoreError::InvalidId("not-an-id".into())));
    }

    #[tokio::test]
    async fn test_slow_read_times_out() {
        let timeout = Duration::from_millis(20);
        let store = BoundedStore::new(SlowStore, timeout, RetryPolicy::default());

        let result = store.find_associations_by_profile("p1").await;
        assert_eq!(result, Err(StoreError::Timeout(timeout)));
    }
}
