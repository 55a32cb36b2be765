//! Member cache: uuid -> resolved member handle.
//!
//! Entries live until they are evicted explicitly. A hit returns the handle that
//! was resolved earlier even if the member has since changed on disk.

use crate::member::Member;
use crate::types::MemberId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct MemberCache {
    entries: RwLock<HashMap<MemberId, Arc<Member>>>,
}

impl MemberCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uuid: &MemberId) -> Option<Arc<Member>> {
        self.entries.read().get(uuid).cloned()
    }

    pub fn put(&self, uuid: MemberId, member: Arc<Member>) {
        self.entries.write().insert(uuid, member);
    }

    pub fn evict(&self, uuids: &[MemberId]) {
        let mut entries = self.entries.write();
        for uuid in uuids {
            entries.remove(uuid);
        }
    }

    /// Keep only entries whose uuid satisfies `keep`
    pub fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&MemberId) -> bool,
    {
        self.entries.write().retain(|uuid, _| keep(uuid));
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn contains(&self, uuid: &MemberId) -> bool {
        self.entries.read().contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
