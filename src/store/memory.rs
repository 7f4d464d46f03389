//! In-process document store
//!
//! Holds the three entity kinds in hash maps keyed by id. Used by the
//! `memory` backend (optionally seeded from a JSON file) and by tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::EntityStore;
use crate::model::{Association, Collection, Profile};
use crate::{StoreError, StoreResult};

/// Seed file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub associations: Vec<Association>,
}

#[derive(Default)]
struct Documents {
    profiles: HashMap<String, Profile>,
    collections: HashMap<String, Collection>,
    associations: HashMap<String, Association>,
}

#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<Documents>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: Seed) -> Self {
        let store = Self::new();
        {
            let mut docs = store
                .documents
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            for profile in seed.profiles {
                docs.profiles.insert(profile.id.clone(), profile);
            }
            for collection in seed.collections {
                docs.collections.insert(collection.id.clone(), collection);
            }
            for association in seed.associations {
                docs.associations.insert(association.id.clone(), association);
            }
        }
        store
    }

    /// Load a JSON seed file
    pub fn from_seed_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        let seed: Seed = serde_json::from_str(&content)
            .with_context(|| format!("invalid seed file {}", path.display()))?;
        Ok(Self::from_seed(seed))
    }

    pub fn insert_profile(&self, profile: Profile) -> StoreResult<()> {
        self.write()?.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    pub fn insert_collection(&self, collection: Collection) -> StoreResult<()> {
        self.write()?
            .collections
            .insert(collection.id.clone(), collection);
        Ok(())
    }

    pub fn insert_association(&self, association: Association) -> StoreResult<()> {
        self.write()?
            .associations
            .insert(association.id.clone(), association);
        Ok(())
    }

    /// Delete a collection, leaving any association that points at it dangling
    pub fn remove_collection(&self, id: &str) -> StoreResult<Option<Collection>> {
        Ok(self.write()?.collections.remove(id))
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Documents>> {
        self.documents
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Documents>> {
        self.documents
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

fn check_id(id: &str) -> StoreResult<()> {
    if id.trim().is_empty() {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_associations_by_profile(
        &self,
        profile_id: &str,
    ) -> StoreResult<Vec<Association>> {
        check_id(profile_id)?;
        let docs = self.read()?;
        Ok(docs
            .associations
            .values()
            .filter(|a| a.profile_id == profile_id)
            .cloned()
            .collect())
    }

    async fn find_collections_by_ids(&self, ids: &[String]) -> StoreResult<Vec<Collection>> {
        let docs = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| docs.collections.get(id))
            .cloned()
            .collect())
    }

    async fn find_profile(&self, profile_id: &str) -> StoreResult<Option<Profile>> {
        check_id(profile_id)?;
        Ok(self.read()?.profiles.get(profile_id).cloned())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }
}
