//! GraphQL schema (Query Gateway)
//!
//! ```graphql
//! type Collection { id: ID!  name: String!  videos: Int! }
//! type Profile { id: ID!  name: String!  avatar: String!  age: Int!  collections: [Collection!]! }
//! type Query {
//!   getChildCollections(profileId: ID!): [Collection!]!
//!   profile(profileId: ID!): Profile
//! }
//! ```
//!
//! Any caller can query any profile: the service performs no
//! authentication or authorization and must sit behind a trusted edge.

use async_graphql::{
    EmptyMutation, EmptySubscription, ErrorExtensions, FieldResult, Object, Schema,
    SimpleObject, ID,
};
use tracing::{error, warn};

use crate::config::GraphQLConfig;
use crate::model::{Collection, Profile};
use crate::resolver::AssociationResolver;
use crate::ResolveError;

/// Message returned for every collection lookup failure
pub const FETCH_COLLECTIONS_ERROR: &str = "Error fetching collections";

/// Message returned for every profile lookup failure
pub const FETCH_PROFILE_ERROR: &str = "Error fetching profile";

/// GraphQL `Int` is 32-bit signed; larger counts are capped at `i32::MAX`
fn wire_int(value: u32, field: &'static str, id: &str) -> i32 {
    i32::try_from(value).unwrap_or_else(|_| {
        warn!(field, id, value, "count exceeds GraphQL Int range, capping");
        i32::MAX
    })
}

/// Wire form of a collection
#[derive(SimpleObject, Debug, Clone, PartialEq)]
#[graphql(name = "Collection")]
pub struct CollectionNode {
    pub id: ID,
    pub name: String,
    pub videos: i32,
}

impl From<Collection> for CollectionNode {
    fn from(collection: Collection) -> Self {
        Self {
            videos: wire_int(collection.videos, "videos", &collection.id),
            id: ID(collection.id),
            name: collection.name,
        }
    }
}

/// Wire form of a profile. The PIN is deliberately absent.
pub struct ProfileNode {
    profile: Profile,
    resolver: AssociationResolver,
}

#[Object(name = "Profile")]
impl ProfileNode {
    async fn id(&self) -> ID {
        ID(self.profile.id.clone())
    }

    async fn name(&self) -> &str {
        &self.profile.name
    }

    async fn avatar(&self) -> &str {
        &self.profile.avatar
    }

    async fn age(&self) -> i32 {
        wire_int(self.profile.age, "age", &self.profile.id)
    }

    async fn collections(&self) -> FieldResult<Vec<CollectionNode>> {
        collections_for(&self.resolver, &self.profile.id).await
    }
}

/// Collapse a resolver failure into one opaque GraphQL error
///
/// The full cause is logged; callers only see `message` and a stable
/// `extensions.code`.
fn opaque_error(err: ResolveError, message: &'static str) -> async_graphql::Error {
    error!(error = %err, code = err.code(), "{}", message);
    let code = err.code();
    async_graphql::Error::new(message).extend_with(|_, ext| ext.set("code", code))
}

async fn collections_for(
    resolver: &AssociationResolver,
    profile_id: &str,
) -> FieldResult<Vec<CollectionNode>> {
    resolver
        .resolve(profile_id)
        .await
        .map(|found| found.into_iter().map(CollectionNode::from).collect())
        .map_err(|e| opaque_error(e, FETCH_COLLECTIONS_ERROR))
}

pub struct QueryRoot {
    pub resolver: AssociationResolver,
}

#[Object(name = "Query")]
impl QueryRoot {
    /// Collections a child profile is subscribed to, ordered by id
    async fn get_child_collections(&self, profile_id: ID) -> FieldResult<Vec<CollectionNode>> {
        collections_for(&self.resolver, profile_id.as_str()).await
    }

    /// Look up a profile; null when it does not exist
    async fn profile(&self, profile_id: ID) -> FieldResult<Option<ProfileNode>> {
        let found = self
            .resolver
            .profile(profile_id.as_str())
            .await
            .map_err(|e| opaque_error(e, FETCH_PROFILE_ERROR))?;

        Ok(found.map(|profile| ProfileNode {
            profile,
            resolver: self.resolver.clone(),
        }))
    }
}

pub type AppSchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

pub fn build_schema(resolver: AssociationResolver, cfg: &GraphQLConfig) -> AppSchema {
    let mut builder = Schema::build(QueryRoot { resolver }, EmptyMutation, EmptySubscription)
        .limit_depth(cfg.max_depth)
        .limit_complexity(cfg.max_complexity);

    if !cfg.introspection {
        builder = builder.disable_introspection();
    }

    builder.finish()
}
