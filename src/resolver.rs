//! Association Resolver
//!
//! Joins a profile to its collections through the association records.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::model::{Collection, Profile};
use crate::store::EntityStore;
use crate::ResolveError;

#[derive(Clone)]
pub struct AssociationResolver {
    store: Arc<dyn EntityStore>,
}

impl AssociationResolver {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Collections associated with `profile_id`, ordered by collection id
    ///
    /// A profile with no associations, or one that does not exist, yields an
    /// empty list. Associations pointing at deleted collections are dropped.
    /// Each collection appears once however many associations reference it.
    #[instrument(skip(self))]
    pub async fn resolve(&self, profile_id: &str) -> Result<Vec<Collection>, ResolveError> {
        let associations = self.store.find_associations_by_profile(profile_id).await?;

        let ids: Vec<String> = associations
            .into_iter()
            .map(|a| a.collection_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if ids.is_empty() {
            debug!("profile has no associations");
            return Ok(Vec::new());
        }

        let mut collections = self.store.find_collections_by_ids(&ids).await?;
        collections.sort_by(|a, b| a.id.cmp(&b.id));
        collections.dedup_by(|a, b| a.id == b.id);

        debug!(
            referenced = ids.len(),
            found = collections.len(),
            "resolved collections"
        );
        Ok(collections)
    }

    #[instrument(skip(self))]
    pub async fn profile(&self, profile_id: &str) -> Result<Option<Profile>, ResolveError> {
        Ok(self.store.find_profile(profile_id).await?)
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Association;
    use crate::store::{MemoryStore, MockEntityStore};
    use crate::StoreError;

    fn fixture() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert_collection(Collection::new("c1", "Cartoons", 5)).unwrap();
        store.insert_collection(Collection::new("c2", "Science", 3)).unwrap();
        store.insert_collection(Collection::new("c3", "Music", 8)).unwrap();
        store.insert_association(Association::new("a1", "p1", "c3")).unwrap();
        store.insert_association(Association::new("a2", "p1", "c1")).unwrap();
        store.insert_association(Association::new("a3", "p1", "c2")).unwrap();
        Arc::new(store)
    }

    fn ids(collections: &[Collection]) -> Vec<&str> {
        collections.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_resolve_orders_by_collection_id() {
        let resolver = AssociationResolver::new(fixture());
        let found = resolver.resolve("p1").await.unwrap();
        assert_eq!(ids(&found), vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn test_profile_without_associations_is_empty() {
        let resolver = AssociationResolver::new(fixture());
        assert_eq!(resolver.resolve("p2").await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_dangling_association_is_excluded() {
        let store = fixture();
        store.remove_collection("c2").unwrap();

        let resolver = AssociationResolver::new(store);
        let found = resolver.resolve("p1").await.unwrap();
        assert_eq!(ids(&found), vec!["c1", "c3"]);
    }

    #[tokio::test]
    async fn test_duplicate_references_appear_once() {
        let store = fixture();
        store.insert_association(Association::new("a4", "p1", "c1")).unwrap();
        store.insert_association(Association::new("a5", "p1", "c1")).unwrap();

        let resolver = AssociationResolver::new(store);
        let found = resolver.resolve("p1").await.unwrap();
        assert_eq!(ids(&found), vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let resolver = AssociationResolver::new(fixture());
        let first = resolver.resolve("p1").await.unwrap();
        let second = resolver.resolve("p1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_collection_ids_are_deduplicated_before_lookup() {
        let mut mock = MockEntityStore::new();
        mock.expect_find_associations_by_profile().returning(|profile| {
            Ok(vec![
                Association::new("a1", profile, "c2"),
                Association::new("a2", profile, "c1"),
                Association::new("a3", profile, "c2"),
            ])
        });
        mock.expect_find_collections_by_ids()
            .withf(|ids| ids.len() == 2 && ids[0] == "c1" && ids[1] == "c2")
            .times(1)
            .returning(|_| {
                Ok(vec![
                    Collection::new("c2", "Science", 3),
                    Collection::new("c1", "Cartoons", 5),
                ])
            });

        let resolver = AssociationResolver::new(Arc::new(mock));
        let found = resolver.resolve("p1").await.unwrap();
        assert_eq!(ids(&found), vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_no_collection_read_without_associations() {
        let mut mock = MockEntityStore::new();
        mock.expect_find_associations_by_profile()
            .returning(|_| Ok(Vec::new()));
        mock.expect_find_collections_by_ids().never();

        let resolver = AssociationResolver::new(Arc::new(mock));
        assert!(resolver.resolve("p1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_association_read_failure_propagates() {
        let mut mock = MockEntityStore::new();
        mock.expect_find_associations_by_profile()
            .returning(|_| Err(StoreError::Unavailable("connection refused".into())));

        let resolver = AssociationResolver::new(Arc::new(mock));
        let err = resolver.resolve("p1").await.unwrap_err();
        assert_eq!(
            err,
            ResolveError::StoreUnavailable(StoreError::Unavailable("connection refused".into()))
        );
        assert_eq!(err.code(), "STORE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_collection_read_failure_propagates() {
        let mut mock = MockEntityStore::new();
        mock.expect_find_associations_by_profile()
            .returning(|profile| Ok(vec![Association::new("a1", profile, "c1")]));
        mock.expect_find_collections_by_ids()
            .returning(|_| Err(StoreError::Timeout(std::time::Duration::from_secs(3))));

        let resolver = AssociationResolver::new(Arc::new(mock));
        let err = resolver.resolve("p1").await.unwrap_err();
        assert_eq!(err.code(), "STORE_TIMEOUT");
    }

    #[tokio::test]
    async fn test_profile_lookup() {
        let store = fixture();
        store
            .insert_profile(Profile {
                id: "p1".into(),
                name: "Ana".into(),
                pin: "1234".into(),
                avatar: "cat.png".into(),
                age: 7,
            })
            .unwrap();

        let resolver = AssociationResolver::new(store);
        assert_eq!(
            resolver.profile("p1").await.unwrap().map(|p| p.name),
            Some("Ana".to_string())
        );
        assert_eq!(resolver.profile("p2").await, Ok(None));
    }
}
