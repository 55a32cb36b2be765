//! Core identity types shared across the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Stable unique identifier of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(Uuid);

impl MemberId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        MemberId(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        MemberId(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for MemberId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(MemberId)
    }
}

/// Kind of a member; part of its state file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    Treant,
    Sim,
    Group,
}

impl MemberKind {
    pub const ALL: [MemberKind; 3] = [MemberKind::Treant, MemberKind::Sim, MemberKind::Group];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Treant => "Treant",
            MemberKind::Sim => "Sim",
            MemberKind::Group => "Group",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MemberKind::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown member kind: {}", s))
    }
}

/// One row of a membership table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub uuid: MemberId,
    pub kind: MemberKind,
    /// Absolute path of the member's directory
    pub location: PathBuf,
}

impl MemberRecord {
    pub fn new(uuid: MemberId, kind: MemberKind, location: impl Into<PathBuf>) -> Self {
        Self {
            uuid,
            kind,
            location: location.into(),
        }
    }
}
