//! Mutable membership and seen state for one group

use std::collections::HashSet;
use std::sync::Mutex;

use crate::data::{FileId, GroupKey};

/// One materialized group: the set of files sharing a key's attribute value,
/// plus the persisted-elsewhere "seen" flag mirrored in memory.
///
/// Groups are shared as `Arc<Group>` between the manager's map and both
/// sorted views, so a materialization that updates an existing group in
/// place preserves its identity for registered listeners. The interior
/// mutex scopes the remove-then-check-empty sequence: eviction decisions
/// inspect emptiness right after mutation without another lock acquisition.
#[derive(Debug)]
pub struct Group {
	key: GroupKey,
	inner: Mutex<GroupInner>,
}

#[derive(Debug)]
struct GroupInner {
	file_ids: HashSet<FileId>,
	seen: bool,
}

impl Group {
	pub fn new(key: GroupKey, file_ids: HashSet<FileId>, seen: bool) -> Self {
		Self {
			key,
			inner: Mutex::new(GroupInner { file_ids, seen }),
		}
	}

	pub fn key(&self) -> &GroupKey {
		&self.key
	}

	/// Add a single file. No-op if already present.
	pub fn add_file(&self, id: FileId) {
		self.inner.lock().unwrap().file_ids.insert(id);
	}

	/// Remove a single file if present and return the remaining member
	/// count, so the caller can decide eviction atomically with the removal.
	pub fn remove_file(&self, id: FileId) -> usize {
		let mut inner = self.inner.lock().unwrap();
		inner.file_ids.remove(&id);
		inner.file_ids.len()
	}

	/// Replace the whole membership set (rebuild refresh of an existing group).
	pub fn set_files(&self, file_ids: HashSet<FileId>) {
		self.inner.lock().unwrap().file_ids = file_ids;
	}

	pub fn set_seen(&self, seen: bool) {
		self.inner.lock().unwrap().seen = seen;
	}

	pub fn is_seen(&self) -> bool {
		self.inner.lock().unwrap().seen
	}

	pub fn contains(&self, id: FileId) -> bool {
		self.inner.lock().unwrap().file_ids.contains(&id)
	}

	pub fn len(&self) -> usize {
		self.inner.lock().unwrap().file_ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.lock().unwrap().file_ids.is_empty()
	}

	/// Snapshot of the current membership.
	pub fn file_ids(&self) -> HashSet<FileId> {
		self.inner.lock().unwrap().file_ids.clone()
	}
}
