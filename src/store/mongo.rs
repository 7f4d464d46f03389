//! MongoDB backend
//!
//! Reads the documents written by the content admin service: profiles in
//! `childrens`, collections in `collections` and subscriptions in `subs`
//! (names configurable). All identifiers are ObjectIds.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use serde::Deserialize;

use super::EntityStore;
use crate::config::{CollectionNames, StoreConfig};
use crate::model::{Association, Collection, Profile};
use crate::{StoreError, StoreResult};

#[derive(Debug, Deserialize)]
struct ChildDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    name: String,
    pin: String,
    avatar: String,
    age: Bson,
}

#[derive(Debug, Deserialize)]
struct CollectionDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    name: String,
    videos: Bson,
}

#[derive(Debug, Deserialize)]
struct SubDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    children: ObjectId,
    collection: ObjectId,
}

/// Numbers written by the JS driver may land as int32, int64 or double
///
/// `None` for anything that is not a whole number in `0..=u32::MAX`.
fn count(value: &Bson) -> Option<u32> {
    match value {
        Bson::Int32(n) => u32::try_from(*n).ok(),
        Bson::Int64(n) => u32::try_from(*n).ok(),
        Bson::Double(n) if n.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(n) => {
            Some(*n as u32)
        }
        _ => None,
    }
}

fn invalid_field(id: &ObjectId, field: &str, value: &Bson) -> StoreError {
    StoreError::InvalidDocument(format!("{id}: {field} = {value}"))
}

impl TryFrom<ChildDocument> for Profile {
    type Error = StoreError;

    fn try_from(doc: ChildDocument) -> StoreResult<Self> {
        let age = count(&doc.age).ok_or_else(|| invalid_field(&doc.id, "age", &doc.age))?;
        Ok(Profile {
            id: doc.id.to_hex(),
            name: doc.name,
            pin: doc.pin,
            avatar: doc.avatar,
            age,
        })
    }
}

impl TryFrom<CollectionDocument> for Collection {
    type Error = StoreError;

    fn try_from(doc: CollectionDocument) -> StoreResult<Self> {
        let videos =
            count(&doc.videos).ok_or_else(|| invalid_field(&doc.id, "videos", &doc.videos))?;
        Ok(Collection {
            id: doc.id.to_hex(),
            name: doc.name,
            videos,
        })
    }
}

impl From<SubDocument> for Association {
    fn from(doc: SubDocument) -> Self {
        Association {
            id: doc.id.to_hex(),
            profile_id: doc.children.to_hex(),
            collection_id: doc.collection.to_hex(),
        }
    }
}

fn unavailable(err: mongodb::error::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn object_id(id: &str) -> StoreResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

pub struct MongoStore {
    client: Client,
    db: Database,
    names: CollectionNames,
}

impl MongoStore {
    /// Open a client against `cfg.uri`
    ///
    /// The driver connects lazily; call [`EntityStore::ping`] to verify the
    /// server is reachable.
    pub async fn connect(cfg: &StoreConfig) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(&cfg.uri).await.map_err(unavailable)?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        options.server_selection_timeout = Some(Duration::from_millis(cfg.timeout_ms));

        let client = Client::with_options(options).map_err(unavailable)?;
        let db = client.database(&cfg.database);

        Ok(Self {
            client,
            db,
            names: cfg.collections.clone(),
        })
    }
}

#[async_trait]
impl EntityStore for MongoStore {
    async fn find_associations_by_profile(
        &self,
        profile_id: &str,
    ) -> StoreResult<Vec<Association>> {
        let filter = doc! { "children": object_id(profile_id)? };
        let subs: Vec<SubDocument> = self
            .db
            .collection::<SubDocument>(&self.names.associations)
            .find(filter)
            .await
            .map_err(unavailable)?
            .try_collect()
            .await
            .map_err(unavailable)?;

        Ok(subs.into_iter().map(Association::from).collect())
    }

    async fn find_collections_by_ids(&self, ids: &[String]) -> StoreResult<Vec<Collection>> {
        let oids: Vec<ObjectId> = ids
            .iter()
            .filter_map(|id| ObjectId::parse_str(id).ok())
            .collect();
        if oids.is_empty() {
            return Ok(Vec::new());
        }

        let filter = doc! { "_id": { "$in": oids } };
        let docs: Vec<CollectionDocument> = self
            .db
            .collection::<CollectionDocument>(&self.names.collections)
            .find(filter)
            .await
            .map_err(unavailable)?
            .try_collect()
            .await
            .map_err(unavailable)?;

        docs.into_iter().map(Collection::try_from).collect()
    }

    async fn find_profile(&self, profile_id: &str) -> StoreResult<Option<Profile>> {
        let filter = doc! { "_id": object_id(profile_id)? };
        let found = self
            .db
            .collection::<ChildDocument>(&self.names.profiles)
            .find_one(filter)
            .await
            .map_err(unavailable)?;

        found.map(Profile::try_from).transpose()
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_: Document| ())
            .map_err(unavailable)
    }

    async fn close(&self) -> StoreResult<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}
