//! # child-collections
//!
//! GraphQL read service that answers "which video collections does this
//! child profile have?" by joining profiles to collections through their
//! subscription (association) records.
//!
//! ## Features
//!
//! - **Entity Store** - pluggable document store (in-memory, MongoDB)
//! - **Association Resolver** - de-duplicated, id-ordered join
//! - **Query Gateway** - `getChildCollections` over async-graphql
//! - **HTTP Server** - axum transport with GraphiQL and health probes
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use child_collections::{AssociationResolver, MemoryStore};
//!
//! # async fn example() -> Result<(), child_collections::ResolveError> {
//! let resolver = AssociationResolver::new(Arc::new(MemoryStore::new()));
//! let collections = resolver.resolve("p1").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod model;
pub mod resolver;
pub mod schema;
pub mod server;
pub mod store;
pub mod telemetry;

pub use model::{Association, Collection, Profile};
pub use resolver::AssociationResolver;
pub use schema::{build_schema, AppSchema};
pub use store::{BoundedStore, EntityStore, MemoryStore, RetryPolicy};

use std::time::Duration;
use thiserror::Error;

/// Entity Store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed identifier: {0}")]
    InvalidId(String),

    #[error("Malformed document: {0}")]
    InvalidDocument(String),
}

impl StoreError {
    /// Whether a retry of the same read can succeed
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            StoreError::InvalidId(_) | StoreError::InvalidDocument(_)
        )
    }
}

/// Association Resolver errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(StoreError),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),
}

impl ResolveError {
    /// Stable error code reported in GraphQL error extensions
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::StoreUnavailable(StoreError::Timeout(_)) => "STORE_TIMEOUT",
            ResolveError::StoreUnavailable(StoreError::InvalidDocument(_)) => "INVALID_DOCUMENT",
            ResolveError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            ResolveError::InvalidId(_) => "INVALID_ID",
        }
    }
}

impl From<StoreError> for ResolveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidId(id) => ResolveError::InvalidId(id),
            other => ResolveError::StoreUnavailable(other),
        }
    }
}

/// Result type for Entity Store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
