//! Member Collections
//!
//! An ordered, indexable view over a membership table. Records are resolved into
//! member handles lazily: the cache answers first, the resolver handles misses.
//!
//! Single-index access is strict and fails when the member cannot be found.
//! Multi-item access is best-effort and leaves `None` in the slots of members that
//! cannot be found right now.

use crate::aggregate::DatasetAggregator;
use crate::config::{AggregateConfig, TreantsConfig};
use crate::error::CollectionError;
use crate::member::{state, Member};
use crate::membership::{MemberCache, MembershipTable, MemoryMembershipTable};
use crate::resolver::{FsResolver, MemberResolver};
use crate::types::{MemberId, MemberKind, MemberRecord};
use std::collections::HashSet;
use std::ops::{Bound, RangeBounds};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Anything that can be added to a collection
#[derive(Debug, Clone)]
pub enum MemberSource {
    /// An already loaded member
    Member(Arc<Member>),
    /// A state file, or a directory holding state files
    Path(PathBuf),
    /// A bare record, e.g. taken from another collection
    Record(MemberRecord),
    /// Nested sources
    Many(Vec<MemberSource>),
}

impl From<Arc<Member>> for MemberSource {
    fn from(member: Arc<Member>) -> Self {
        MemberSource::Member(member)
    }
}

impl From<Member> for MemberSource {
    fn from(member: Member) -> Self {
        MemberSource::Member(Arc::new(member))
    }
}

impl From<PathBuf> for MemberSource {
    fn from(path: PathBuf) -> Self {
        MemberSource::Path(path)
    }
}

impl From<&Path> for MemberSource {
    fn from(path: &Path) -> Self {
        MemberSource::Path(path.to_path_buf())
    }
}

impl From<&str> for MemberSource {
    fn from(path: &str) -> Self {
        MemberSource::Path(PathBuf::from(path))
    }
}

impl From<MemberRecord> for MemberSource {
    fn from(record: MemberRecord) -> Self {
        MemberSource::Record(record)
    }
}

impl From<Vec<MemberSource>> for MemberSource {
    fn from(sources: Vec<MemberSource>) -> Self {
        MemberSource::Many(sources)
    }
}

/// Ordered collection of members
pub struct MemberCollection {
    table: Box<dyn MembershipTable>,
    cache: MemberCache,
    resolver: Arc<dyn MemberResolver>,
    aggregate: AggregateConfig,
}

impl Default for MemberCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberCollection {
    /// Empty in-memory collection with the default filesystem resolver
    pub fn new() -> Self {
        Self::with_parts(
            Box::new(MemoryMembershipTable::new()),
            Arc::new(FsResolver::new()),
        )
    }

    /// Collection over the given table and resolver
    pub fn with_parts(table: Box<dyn MembershipTable>, resolver: Arc<dyn MemberResolver>) -> Self {
        Self {
            table,
            cache: MemberCache::new(),
            resolver,
            aggregate: AggregateConfig::default(),
        }
    }

    /// In-memory collection configured for resolution and aggregation
    pub fn from_config(config: &TreantsConfig) -> Self {
        Self::with_parts(
            Box::new(MemoryMembershipTable::new()),
            Arc::new(FsResolver::with_config(config.resolver.clone())),
        )
        .with_aggregate_config(config.aggregate.clone())
    }

    pub fn with_aggregate_config(mut self, aggregate: AggregateConfig) -> Self {
        self.aggregate = aggregate;
        self
    }

    pub fn aggregate_config(&self) -> &AggregateConfig {
        &self.aggregate
    }

    pub fn cache(&self) -> &MemberCache {
        &self.cache
    }

    pub fn len(&self) -> Result<usize, CollectionError> {
        Ok(self.table.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, CollectionError> {
        Ok(self.table.is_empty()?)
    }

    /// Member at `index`; fails if it cannot be resolved
    pub fn get(&self, index: usize) -> Result<Arc<Member>, CollectionError> {
        let records = self.table.records()?;
        let record = records.get(index).ok_or(CollectionError::IndexOutOfRange {
            index,
            len: records.len(),
        })?;

        self.resolve_records(std::slice::from_ref(record))?
            .pop()
            .flatten()
            .ok_or(CollectionError::MemberNotFound {
                index,
                uuid: record.uuid,
            })
    }

    /// Members in `range`, clamped to the collection; unresolvable slots are `None`
    pub fn slice<R: RangeBounds<usize>>(
        &self,
        range: R,
    ) -> Result<Vec<Option<Arc<Member>>>, CollectionError> {
        let records = self.table.records()?;
        let len = records.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .clamp(start, len);

        self.resolve_records(&records[start..end])
    }

    /// Members at the given indices, in that order; unresolvable slots are `None`
    pub fn select(&self, indices: &[usize]) -> Result<Vec<Option<Arc<Member>>>, CollectionError> {
        let records = self.table.records()?;
        let chosen = indices
            .iter()
            .map(|&index| {
                records
                    .get(index)
                    .cloned()
                    .ok_or(CollectionError::IndexOutOfRange {
                        index,
                        len: records.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.resolve_records(&chosen)
    }

    /// Every member in table order; unresolvable slots are `None`
    pub fn list(&self) -> Result<Vec<Option<Arc<Member>>>, CollectionError> {
        let records = self.table.records()?;
        let present: HashSet<MemberId> = records.iter().map(|r| r.uuid).collect();
        self.cache.retain(|uuid| present.contains(uuid));
        self.resolve_records(&records)
    }

    /// Add members; returns the number of distinct members written
    ///
    /// Paths that do not exist, or hold no readable state file, are skipped. A
    /// member named more than once keeps its last record. Loaded handles enter the
    /// cache only once their record is in the table.
    pub fn add<I, S>(&self, sources: I) -> Result<usize, CollectionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<MemberSource>,
    {
        let mut entries = Vec::new();
        for source in sources {
            self.collect_source(source.into(), &mut entries);
        }

        let mut written = HashSet::new();
        for (record, member) in entries {
            let uuid = record.uuid;
            self.table.add(record)?;
            if let Some(member) = member {
                self.cache.put(uuid, member);
            }
            written.insert(uuid);
        }
        info!(added = written.len(), "Members added");
        Ok(written.len())
    }

    fn collect_source(
        &self,
        source: MemberSource,
        entries: &mut Vec<(MemberRecord, Option<Arc<Member>>)>,
    ) {
        match source {
            MemberSource::Many(sources) => {
                for source in sources {
                    self.collect_source(source, entries);
                }
            }
            MemberSource::Record(record) => entries.push((record, None)),
            MemberSource::Member(member) => entries.push((member.record(), Some(member))),
            MemberSource::Path(path) => {
                let state_files = match state::discover(&path) {
                    Ok(files) => files,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable path");
                        return;
                    }
                };
                if state_files.is_empty() {
                    debug!(path = %path.display(), "No member at path; skipped");
                }
                for file in state_files {
                    match Member::open(&file) {
                        Ok(member) => entries.push((member.record(), Some(Arc::new(member)))),
                        Err(e) => {
                            warn!(path = %file.display(), error = %e, "Skipping unreadable member")
                        }
                    }
                }
            }
        }
    }

    /// Remove members by index, resolved against the current ordering
    ///
    /// All indices are checked before anything is removed.
    pub fn remove(&self, indices: &[usize]) -> Result<(), CollectionError> {
        let uuids = self.table.uuids()?;
        let doomed = indices
            .iter()
            .map(|&index| {
                uuids
                    .get(index)
                    .copied()
                    .ok_or(CollectionError::IndexOutOfRange {
                        index,
                        len: uuids.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.table.remove(&doomed)?;
        self.cache.evict(&doomed);
        info!(removed = doomed.len(), "Members removed");
        Ok(())
    }

    pub fn remove_all(&self) -> Result<(), CollectionError> {
        self.table.remove_all()?;
        self.cache.clear();
        info!("All members removed");
        Ok(())
    }

    /// Member names in order; `None` marks a member that cannot be found
    pub fn names(&self) -> Result<Vec<Option<String>>, CollectionError> {
        Ok(self
            .list()?
            .into_iter()
            .map(|m| m.map(|m| m.name().to_string()))
            .collect())
    }

    pub fn kinds(&self) -> Result<Vec<MemberKind>, CollectionError> {
        Ok(self.table.kinds()?)
    }

    pub fn uuids(&self) -> Result<Vec<MemberId>, CollectionError> {
        Ok(self.table.uuids()?)
    }

    pub fn locations(&self) -> Result<Vec<PathBuf>, CollectionError> {
        Ok(self.table.locations()?)
    }

    pub fn records(&self) -> Result<Vec<MemberRecord>, CollectionError> {
        Ok(self.table.records()?)
    }

    /// This collection's members as a source for another collection
    pub fn to_source(&self) -> Result<MemberSource, CollectionError> {
        Ok(MemberSource::Many(
            self.table
                .records()?
                .into_iter()
                .map(MemberSource::Record)
                .collect(),
        ))
    }

    /// Dataset aggregation over the currently resolvable members
    pub fn data(&self) -> Result<DatasetAggregator, CollectionError> {
        Ok(DatasetAggregator::new(self.list()?)
            .with_index_by(self.aggregate.index_by)
            .with_duplicate_names(self.aggregate.duplicate_names))
    }

    /// Resolve records through the cache, then the resolver for misses
    fn resolve_records(
        &self,
        records: &[MemberRecord],
    ) -> Result<Vec<Option<Arc<Member>>>, CollectionError> {
        let mut resolved: Vec<Option<Arc<Member>>> = records
            .iter()
            .map(|record| self.cache.get(&record.uuid))
            .collect();

        let misses: Vec<MemberRecord> = records
            .iter()
            .zip(&resolved)
            .filter(|(_, hit)| hit.is_none())
            .map(|(record, _)| record.clone())
            .collect();
        if misses.is_empty() {
            return Ok(resolved);
        }
        debug!(hits = records.len() - misses.len(), misses = misses.len(), "Resolving members");

        let found = self.resolver.resolve(&misses)?;
        for (slot, record) in resolved.iter_mut().zip(records) {
            if slot.is_some() {
                continue;
            }
            let Some(member) = found.get(&record.uuid) else {
                continue;
            };

            // The member moved or changed kind since it was recorded.
            if (member.location() != record.location || member.kind() != record.kind)
                && self.table.get(&record.uuid)?.is_some()
            {
                self.table.add(member.record())?;
            }
            self.cache.put(record.uuid, Arc::clone(member));
            *slot = Some(Arc::clone(member));
        }

        Ok(resolved)
    }
}
