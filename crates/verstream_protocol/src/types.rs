//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a row in a user's log.
///
/// Versions are unique per user and strictly increasing along the log;
/// gaps are allowed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(pub i64);

impl Version {
    /// The first version of an empty log.
    pub const ZERO: Version = Version(0);

    /// The largest version a log accepts. It leaves room for [`next`](Self::next).
    pub const MAX: Version = Version(i64::MAX - 1);

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns the version directly after this one, saturating at `i64::MAX`.
    #[must_use]
    pub const fn next(self) -> Version {
        Version(self.0.saturating_add(1))
    }

    /// Returns the version directly after this one, or `None` on overflow.
    #[must_use]
    pub const fn checked_next(self) -> Option<Version> {
        match self.0.checked_add(1) {
            Some(value) => Some(Version(value)),
            None => None,
        }
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Version(value)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Stable identifier of a logical object across its versions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl EntityId {
    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns the id directly after this one, saturating at `i64::MAX`.
    #[must_use]
    pub const fn next(self) -> EntityId {
        EntityId(self.0.saturating_add(1))
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        EntityId(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
