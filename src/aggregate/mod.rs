//! Cross-member dataset aggregation
//!
//! Reconciles which members carry a dataset handle and merges their values into a
//! single structure. Tables of one shape family are concatenated under an outer
//! member level; anything else comes back as an unmerged per-member mapping.

pub mod merge;

pub use merge::{Aggregated, GroupedTable};

use crate::dataset::ReadOptions;
use crate::error::CollectionError;
use crate::member::Member;
use crate::types::MemberId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key-set reconciliation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// Handles present in at least one member
    Any,
    /// Handles present in every member
    All,
}

impl FromStr for KeyMode {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(KeyMode::Any),
            "all" => Ok(KeyMode::All),
            other => Err(CollectionError::InvalidArgument(format!(
                "mode must be either 'any' or 'all', got '{}'",
                other
            ))),
        }
    }
}

/// Outer index of aggregated data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBy {
    /// Member uuids; always unique
    #[default]
    Uuid,
    /// Member names; may repeat
    Name,
}

impl FromStr for IndexBy {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uuid" => Ok(IndexBy::Uuid),
            "name" => Ok(IndexBy::Name),
            other => Err(CollectionError::InvalidArgument(format!(
                "by must be either 'name' or 'uuid', got '{}'",
                other
            ))),
        }
    }
}

/// Handling of repeated names when indexing by name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateNamePolicy {
    /// Reject the request before reading anything
    #[default]
    Fail,
    /// Log a warning and keep every entry under its repeated key
    Warn,
}

/// Outer index value of one member's contribution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Uuid(MemberId),
    Name(String),
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Uuid(uuid) => write!(f, "{}", uuid),
            IndexKey::Name(name) => f.write_str(name),
        }
    }
}

impl IndexBy {
    pub fn key_of(&self, member: &Member) -> IndexKey {
        match self {
            IndexBy::Uuid => IndexKey::Uuid(member.uuid()),
            IndexBy::Name => IndexKey::Name(member.name().to_string()),
        }
    }
}

/// Aggregates datasets over a snapshot of resolved members
///
/// Unresolved members are left out; they have no datasets to contribute.
/// `get`/`get_many` read whole datasets under the default index.
pub struct DatasetAggregator {
    members: Vec<Arc<Member>>,
    index_by: IndexBy,
    duplicate_names: DuplicateNamePolicy,
}

impl DatasetAggregator {
    pub fn new<I>(members: I) -> Self
    where
        I: IntoIterator<Item = Option<Arc<Member>>>,
    {
        Self {
            members: members.into_iter().flatten().collect(),
            index_by: IndexBy::default(),
            duplicate_names: DuplicateNamePolicy::default(),
        }
    }

    pub fn with_index_by(mut self, by: IndexBy) -> Self {
        self.index_by = by;
        self
    }

    pub fn index_by(&self) -> IndexBy {
        self.index_by
    }

    pub fn with_duplicate_names(mut self, policy: DuplicateNamePolicy) -> Self {
        self.duplicate_names = policy;
        self
    }

    pub fn members(&self) -> &[Arc<Member>] {
        &self.members
    }

    /// Dataset handles across members, reconciled by `mode`
    pub fn keys(&self, mode: KeyMode) -> Result<BTreeSet<String>, CollectionError> {
        let mut sets = Vec::with_capacity(self.members.len());
        for member in &self.members {
            sets.push(member.data().handles()?);
        }

        let mut sets = sets.into_iter();
        let Some(first) = sets.next() else {
            return Ok(BTreeSet::new());
        };
        Ok(match mode {
            KeyMode::Any => sets.fold(first, |acc, s| acc.union(&s).cloned().collect()),
            KeyMode::All => sets.fold(first, |acc, s| acc.intersection(&s).cloned().collect()),
        })
    }

    /// Aggregate one dataset across members
    ///
    /// Fails with `DatasetNotFound` if no member has `handle`. Members without it
    /// are skipped. `options` reach every member's read unchanged.
    pub fn retrieve(
        &self,
        handle: &str,
        by: IndexBy,
        options: &ReadOptions,
    ) -> Result<Aggregated, CollectionError> {
        if !self.keys(KeyMode::Any)?.contains(handle) {
            return Err(CollectionError::DatasetNotFound(handle.to_string()));
        }

        if by == IndexBy::Name {
            self.check_names()?;
        }

        let mut entries = Vec::new();
        for member in &self.members {
            match member.data().read(handle, options)? {
                Some(payload) => entries.push((by.key_of(member), payload)),
                None => debug!(uuid = %member.uuid(), handle, "Member lacks dataset; skipped"),
            }
        }

        Ok(merge::merge(entries))
    }

    /// Aggregate several datasets; element `i` is `retrieve(handles[i])`
    pub fn retrieve_many<S: AsRef<str>>(
        &self,
        handles: &[S],
        by: IndexBy,
        options: &ReadOptions,
    ) -> Result<Vec<Aggregated>, CollectionError> {
        handles
            .iter()
            .map(|handle| self.retrieve(handle.as_ref(), by, options))
            .collect()
    }

    /// `retrieve` of a whole dataset under the default index
    pub fn get(&self, handle: &str) -> Result<Aggregated, CollectionError> {
        self.retrieve(handle, self.index_by, &ReadOptions::new())
    }

    /// `retrieve_many` of whole datasets under the default index
    pub fn get_many<S: AsRef<str>>(&self, handles: &[S]) -> Result<Vec<Aggregated>, CollectionError> {
        self.retrieve_many(handles, self.index_by, &ReadOptions::new())
    }

    fn check_names(&self) -> Result<(), CollectionError> {
        let mut seen = HashSet::new();
        let mut duplicates: Vec<String> = Vec::new();
        for member in &self.members {
            if !seen.insert(member.name()) && !duplicates.iter().any(|d| d == member.name()) {
                duplicates.push(member.name().to_string());
            }
        }
        if duplicates.is_empty() {
            return Ok(());
        }

        match self.duplicate_names {
            DuplicateNamePolicy::Fail => Err(CollectionError::AmbiguousIndex(duplicates)),
            DuplicateNamePolicy::Warn => {
                warn!(
                    ?duplicates,
                    "Member names not unique; entries share keys. Index by uuid to avoid this."
                );
                Ok(())
            }
        }
    }
}
