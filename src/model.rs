//! Domain entities read by the resolver

use serde::{Deserialize, Serialize};

/// Child (viewer) profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    /// Access PIN. Never exposed through the GraphQL schema.
    pub pin: String,
    pub avatar: String,
    pub age: u32,
}

/// Named grouping of videos
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub videos: u32,
}

/// Join record linking one profile to one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub id: String,
    pub profile_id: String,
    pub collection_id: String,
}

impl Collection {
    pub fn new(id: impl Into<String>, name: impl Into<String>, videos: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            videos,
        }
    }
}

impl Association {
    pub fn new(
        id: impl Into<String>,
        profile_id: impl Into<String>,
        collection_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            profile_id: profile_id.into(),
            collection_id: collection_id.into(),
        }
    }
}
