//! Schema versions
//!
//! Versions are dotted numeric strings ("1.0.0", "1.10.0", "2.1"). They are
//! compared component-wise as integers, never as strings, and missing
//! trailing components count as zero.

use crate::errors::{MigrationError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

const MAX_COMPONENTS: usize = 4;

/// A migration version
///
/// Keeps the original text for display and persistence; ordering, equality
/// and hashing use the numeric components with trailing zeros stripped, so
/// `"1.3"` and `"1.3.0"` are the same version.
#[derive(Debug, Clone)]
pub struct SchemaVersion {
    raw: String,
    parts: Vec<u64>,
}

impl SchemaVersion {
    /// Build a `major.minor.patch` version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        let raw = format!("{}.{}.{}", major, minor, patch);
        Self {
            parts: canonical(vec![major, minor, patch]),
            raw,
        }
    }

    /// Parse a dotted numeric version, optionally prefixed with `v`
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || MigrationError::InvalidVersion {
            input: input.to_string(),
        };

        let trimmed = input.trim();
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(invalid().into());
        }

        let mut parts = Vec::new();
        for piece in body.split('.') {
            if piece.is_empty() || !piece.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid().into());
            }
            parts.push(piece.parse::<u64>().map_err(|_| invalid())?);
        }
        if parts.len() > MAX_COMPONENTS {
            return Err(invalid().into());
        }

        Ok(Self {
            raw: trimmed.to_string(),
            parts: canonical(parts),
        })
    }

    /// The version as written by its author
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Numeric component `index`, zero when absent
    pub fn component(&self, index: usize) -> u64 {
        self.parts.get(index).copied().unwrap_or(0)
    }

    /// True when `self` is the next patch, minor or major release after `prev`
    ///
    /// `1.2.0` is followed by `1.2.1`, `1.3.0` or `2.0.0`. Anything else
    /// is a gap in the numbering.
    pub fn is_successor_of(&self, prev: &SchemaVersion) -> bool {
        let width = self.parts.len().max(prev.parts.len()).max(3);
        (0..width).any(|bumped| {
            (0..bumped).all(|i| self.component(i) == prev.component(i))
                && self.component(bumped) == prev.component(bumped) + 1
                && (bumped + 1..width).all(|i| self.component(i) == 0)
        })
    }
}

fn canonical(mut parts: Vec<u64>) -> Vec<u64> {
    while parts.last() == Some(&0) {
        parts.pop();
    }
    parts
}

impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for SchemaVersion {}

impl Hash for SchemaVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Canonical parts have no trailing zeros, so a strict prefix is
        // always the smaller version.
        self.parts.cmp(&other.parts)
    }
}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for SchemaVersion {
    type Err = crate::errors::ExError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SchemaVersion::parse(&raw).map_err(serde::de::Error::custom)
    }
}
