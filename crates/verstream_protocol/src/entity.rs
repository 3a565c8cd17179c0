//! Versioned entities.

use crate::model::{Aerodrome, Aircraft, LogbookEntry, Trip, TripPlan};
use crate::types::{EntityId, Version};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An immutable, numbered snapshot of a logical object.
///
/// On the wire this is one flat JSON object:
///
/// ```json
/// {"version": 3, "entity": 1, "type": "aircraft", "registration": "N123", "model": "C172"}
/// ```
///
/// The `type` tag selects the [`EntityBody`] variant. Unknown tags fail to
/// decode, so the set of variants is checked at compile time wherever it is
/// matched on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedEntity {
    /// Position in the log.
    pub version: Version,
    /// Logical object this is a snapshot of.
    pub entity: EntityId,
    /// Type-specific payload.
    #[serde(flatten)]
    pub body: EntityBody,
}

impl VersionedEntity {
    /// Creates a new snapshot.
    pub fn new(version: impl Into<Version>, entity: impl Into<EntityId>, body: EntityBody) -> Self {
        Self {
            version: version.into(),
            entity: entity.into(),
            body,
        }
    }

    /// Creates a tombstone deleting `entity` as of `version`.
    pub fn tombstone(version: impl Into<Version>, entity: impl Into<EntityId>) -> Self {
        Self::new(version, entity, EntityBody::Tombstone)
    }

    /// Returns the type discriminator.
    pub fn kind(&self) -> EntityKind {
        self.body.kind()
    }

    /// Returns true if this snapshot deletes its entity.
    pub fn is_tombstone(&self) -> bool {
        matches!(self.body, EntityBody::Tombstone)
    }
}

/// Type-specific payload of a [`VersionedEntity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EntityBody {
    /// An aircraft.
    Aircraft(Aircraft),
    /// An aerodrome.
    Aerodrome(Aerodrome),
    /// A trip.
    Trip(Trip),
    /// Planning data for a trip.
    Plan(TripPlan),
    /// A logbook line.
    LogbookEntry(LogbookEntry),
    /// Deletion marker.
    Tombstone,
}

impl EntityBody {
    /// Returns the type discriminator.
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityBody::Aircraft(_) => EntityKind::Aircraft,
            EntityBody::Aerodrome(_) => EntityKind::Aerodrome,
            EntityBody::Trip(_) => EntityKind::Trip,
            EntityBody::Plan(_) => EntityKind::Plan,
            EntityBody::LogbookEntry(_) => EntityKind::LogbookEntry,
            EntityBody::Tombstone => EntityKind::Tombstone,
        }
    }
}

/// Payload-free discriminator of [`EntityBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    /// `aircraft`
    Aircraft,
    /// `aerodrome`
    Aerodrome,
    /// `trip`
    Trip,
    /// `plan`
    Plan,
    /// `logbook-entry`
    LogbookEntry,
    /// `tombstone`
    Tombstone,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Aircraft,
        EntityKind::Aerodrome,
        EntityKind::Trip,
        EntityKind::Plan,
        EntityKind::LogbookEntry,
        EntityKind::Tombstone,
    ];

    /// The wire tag of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Aircraft => "aircraft",
            EntityKind::Aerodrome => "aerodrome",
            EntityKind::Trip => "trip",
            EntityKind::Plan => "plan",
            EntityKind::LogbookEntry => "logbook-entry",
            EntityKind::Tombstone => "tombstone",
        }
    }

    /// Looks up a kind by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == tag)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
