//! Row identity: ids assigned by the store versus ids minted locally for rows that
//! have not been saved yet.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tally_api::endpoints::RowId;
use uuid::Uuid;

/// Marks locally minted ids; store ids never start with it
pub const PENDING_PREFIX: &str = "tmp_";

/// Client-side id for a row that only exists in the change set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingId(String);

impl PendingId {
    pub fn parse(s: &str) -> Option<Self> {
        is_pending(s).then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PendingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn allocate_pending_id() -> PendingId {
    PendingId(format!("{}{}", PENDING_PREFIX, Uuid::new_v4().simple()))
}

pub fn is_pending(id: &str) -> bool {
    id.starts_with(PENDING_PREFIX)
}

/// Identity of an editable row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    Persisted(RowId),
    Pending(PendingId),
}

impl RowKey {
    pub fn parse(s: &str) -> Self {
        match PendingId::parse(s) {
            Some(pending) => RowKey::Pending(pending),
            None => RowKey::Persisted(RowId::from(s)),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RowKey::Pending(_))
    }

    pub fn persisted(&self) -> Option<&RowId> {
        match self {
            RowKey::Persisted(id) => Some(id),
            RowKey::Pending(_) => None,
        }
    }

    pub fn pending(&self) -> Option<&PendingId> {
        match self {
            RowKey::Pending(id) => Some(id),
            RowKey::Persisted(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RowKey::Persisted(id) => id.as_str(),
            RowKey::Pending(id) => id.as_str(),
        }
    }
}

impl Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RowId> for RowKey {
    fn from(id: RowId) -> Self {
        RowKey::Persisted(id)
    }
}

impl From<PendingId> for RowKey {
    fn from(id: PendingId) -> Self {
        RowKey::Pending(id)
    }
}

impl From<&str> for RowKey {
    fn from(s: &str) -> Self {
        RowKey::parse(s)
    }
}

impl Serialize for RowKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RowKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(RowKey::parse(&s))
    }
}
