//! Strongly-typed identifiers for the entities that own authorization scopes.
//!
//! One generic [`EntityId`] carries the UUID; a zero-sized kind marker keeps
//! a clinic id from being passed where a project id is expected.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::IdError;

/// Marker for an entity kind that can own a domain.
pub trait EntityKind {
    const NAME: &'static str;
}

#[derive(Debug)]
pub enum Clinic {}

#[derive(Debug)]
pub enum Project {}

#[derive(Debug)]
pub enum User {}

impl EntityKind for Clinic {
    const NAME: &'static str = "ClinicId";
}

impl EntityKind for Project {
    const NAME: &'static str = "ProjectId";
}

impl EntityKind for User {
    const NAME: &'static str = "UserId";
}

/// Identifier of a clinic (the tenant boundary).
pub type ClinicId = EntityId<Clinic>;
/// Identifier of a project inside a clinic.
pub type ProjectId = EntityId<Project>;
/// Identifier of a user. Its string form is the authorization subject.
pub type UserId = EntityId<User>;

pub struct EntityId<K> {
    uuid: Uuid,
    kind: PhantomData<fn() -> K>,
}

impl<K: EntityKind> EntityId<K> {
    /// Fresh time-ordered (UUIDv7) identifier.
    pub fn new() -> Self {
        Self::from_uuid(Uuid::now_v7())
    }
}

impl<K> EntityId<K> {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            uuid,
            kind: PhantomData,
        }
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.uuid
    }
}

impl<K: EntityKind> Default for EntityId<K> {
    fn default() -> Self {
        Self::new()
    }
}

// Manual impls: derives would demand the same traits of the marker.
impl<K> Clone for EntityId<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for EntityId<K> {}

impl<K> PartialEq for EntityId<K> {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl<K> Eq for EntityId<K> {}

impl<K> Hash for EntityId<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl<K: EntityKind> fmt::Debug for EntityId<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", K::NAME, self.uuid)
    }
}

impl<K> fmt::Display for EntityId<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.uuid, f)
    }
}

impl<K: EntityKind> FromStr for EntityId<K> {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self::from_uuid).map_err(|e| IdError {
            kind: K::NAME,
            reason: e.to_string(),
        })
    }
}

impl<K> Serialize for EntityId<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.uuid.serialize(serializer)
    }
}

impl<'de, K> Deserialize<'de> for EntityId<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Uuid::deserialize(deserializer).map(Self::from_uuid)
    }
}
