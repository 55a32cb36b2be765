//! Member resolution
//!
//! Turns membership records into loaded member handles. The collection asks the
//! resolver only about records it has not cached; the resolver reports what it
//! found and leaves every decision about tables and caches to the caller.

use crate::config::ResolverConfig;
use crate::error::StorageError;
use crate::member::{state, Member};
use crate::types::{MemberId, MemberRecord};
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Maps unresolved records to member handles
///
/// Implementations must be idempotent and must not mutate any membership table or
/// cache. A uuid missing from the returned map is unresolved for this request only.
pub trait MemberResolver: Send + Sync {
    fn resolve(
        &self,
        requests: &[MemberRecord],
    ) -> Result<HashMap<MemberId, Arc<Member>>, StorageError>;
}

/// Filesystem resolver
///
/// Looks at each record's location first, then walks the configured search roots
/// for state files of whatever is still missing.
#[derive(Debug, Clone, Default)]
pub struct FsResolver {
    config: ResolverConfig,
}

impl FsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map_or(false, |name| self.config.ignore_patterns.iter().any(|p| p == name))
    }

    /// Open a candidate state file, treating any failure as "not here"
    fn try_open(path: &Path, uuid: &MemberId) -> Option<Member> {
        match Member::open(path) {
            Ok(member) if member.uuid() == *uuid => Some(member),
            Ok(_) => None,
            Err(StorageError::IoError(e)) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable member state file");
                None
            }
        }
    }

    fn search_roots(
        &self,
        pending: &mut HashSet<MemberId>,
        found: &mut HashMap<MemberId, Arc<Member>>,
    ) {
        for root in &self.config.search_roots {
            if pending.is_empty() {
                return;
            }
            let walker = WalkDir::new(root)
                .follow_links(self.config.follow_symlinks)
                .max_depth(self.config.max_depth.unwrap_or(usize::MAX))
                .into_iter()
                .filter_entry(|e| !self.is_ignored(e));

            for entry in walker {
                // Directories vanish under concurrent writers; keep searching.
                let Ok(entry) = entry else { continue };
                if !entry.file_type().is_file() {
                    continue;
                }
                let Some((_, uuid)) = entry.file_name().to_str().and_then(state::parse_state_filename)
                else {
                    continue;
                };
                if !pending.contains(&uuid) {
                    continue;
                }
                if let Some(member) = Self::try_open(entry.path(), &uuid) {
                    debug!(%uuid, path = %entry.path().display(), "Member found by search");
                    pending.remove(&uuid);
                    found.insert(uuid, Arc::new(member));
                    if pending.is_empty() {
                        return;
                    }
                }
            }
        }
    }
}

impl MemberResolver for FsResolver {
    fn resolve(
        &self,
        requests: &[MemberRecord],
    ) -> Result<HashMap<MemberId, Arc<Member>>, StorageError> {
        let mut found = HashMap::new();
        let mut pending = HashSet::new();

        for record in requests {
            let member = state::find_state_file(&record.location, &record.uuid)
                .and_then(|path| Self::try_open(&path, &record.uuid));
            match member {
                Some(member) => {
                    found.insert(record.uuid, Arc::new(member));
                }
                None => {
                    pending.insert(record.uuid);
                }
            }
        }

        if !pending.is_empty() {
            self.search_roots(&mut pending, &mut found);
        }
        if !pending.is_empty() {
            debug!(unresolved = pending.len(), "Members not found");
        }

        Ok(found)
    }
}
