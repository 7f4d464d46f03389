//! Entity Store access layer
//!
//! The resolver only ever talks to [`EntityStore`]. Backends are chosen once
//! at start-up by [`open`] and wrapped in a [`BoundedStore`] so every read
//! carries a timeout and the configured retry policy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{StoreBackend, StoreConfig};
use crate::model::{Association, Collection, Profile};
use crate::StoreResult;

pub mod bounded;
pub mod memory;
#[cfg(feature = "mongo")]
pub mod mongo;

pub use bounded::{BoundedStore, RetryPolicy};
pub use memory::{MemoryStore, Seed};
#[cfg(feature = "mongo")]
pub use mongo::MongoStore;

/// Read access to profiles, collections and their associations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// All associations whose profile reference equals `profile_id`
    async fn find_associations_by_profile(&self, profile_id: &str)
        -> StoreResult<Vec<Association>>;

    /// All collections whose id is contained in `ids`
    ///
    /// Ids without a matching collection are skipped, not reported.
    async fn find_collections_by_ids(&self, ids: &[String]) -> StoreResult<Vec<Collection>>;

    async fn find_profile(&self, profile_id: &str) -> StoreResult<Option<Profile>>;

    /// Cheap round trip used by the readiness probe
    async fn ping(&self) -> StoreResult<()>;

    /// Release the underlying connection. Called once on shutdown.
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Build the configured backend
pub async fn open(cfg: &StoreConfig) -> anyhow::Result<Arc<dyn EntityStore>> {
    let timeout = Duration::from_millis(cfg.timeout_ms);
    let policy = RetryPolicy::from(&cfg.retry);

    match cfg.backend {
        StoreBackend::Memory => {
            let store = match cfg.seed_path.as_deref() {
                Some(path) => MemoryStore::from_seed_file(path)?,
                None => MemoryStore::new(),
            };
            tracing::info!(
                backend = "memory",
                seed = ?cfg.seed_path,
                "entity store ready"
            );
            Ok(Arc::new(BoundedStore::new(store, timeout, policy)))
        }
        #[cfg(feature = "mongo")]
        StoreBackend::Mongo => {
            let store = MongoStore::connect(cfg).await?;
            tracing::info!(backend = "mongo", database = %cfg.database, "entity store ready");
            Ok(Arc::new(BoundedStore::new(store, timeout, policy)))
        }
        #[cfg(not(feature = "mongo"))]
        StoreBackend::Mongo => {
            anyhow::bail!("store.backend = mongo requires building with the `mongo` feature")
        }
    }
}
