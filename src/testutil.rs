//! In-memory collaborators for tests

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::data::{Attribute, Category, DataSourceId, FileId, FileRecord, GroupKey, GroupValue};
use crate::error::{StoreError, StoreResult};
use crate::group::Group;
use crate::sort::{SortBy, SortOrder};
use crate::store::{CategoryWatcher, GalleryStore, TagSource, ViewStateSink};

/// One in-memory "case": the backing file set plus everything the store and
/// tag-source traits are asked for. Interior mutability so tests can mutate
/// the dataset while a manager holds `Arc<MemCase>` as its store.
pub struct MemCase {
    inner: Mutex<CaseData>,
}

#[derive(Default)]
struct CaseData {
    files: BTreeMap<FileId, FileRecord>,
    /// Path groups the store reports as fully analyzed
    analyzed_paths: HashSet<String>,
    seen: HashMap<GroupKey, bool>,
    seen_writes: Vec<(GroupKey, bool)>,
    /// Mime aggregation rows for ids outside this engine's dataset
    untracked_mimes: Vec<(Option<String>, Vec<FileId>)>,
    /// Tagged ids outside this engine's dataset
    untracked_tags: HashMap<String, Vec<FileId>>,
    value_queries: usize,
    fail_queries: bool,
    open: bool,
}

impl MemCase {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CaseData {
                open: true,
                ..CaseData::default()
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_file(
        &self,
        id: i64,
        data_source: Option<i64>,
        parent_path: &str,
        tags: &[&str],
        mime_type: Option<&str>,
        hash_sets: &[&str],
        analyzed: bool,
    ) {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let category = tags
            .iter()
            .find_map(|t| category_for_tag_name(t))
            .unwrap_or(Category::Zero);
        let record = FileRecord {
            id: FileId(id),
            data_source: data_source.map(DataSourceId),
            parent_path: parent_path.to_string(),
            category,
            tags,
            mime_type: mime_type.map(|m| m.to_string()),
            hash_sets: hash_sets.iter().map(|h| h.to_string()).collect(),
            analyzed,
        };
        self.inner.lock().unwrap().files.insert(FileId(id), record);
    }

    pub fn remove_file(&self, id: i64) {
        self.inner.lock().unwrap().files.remove(&FileId(id));
    }

    /// Add a tag to a file, updating its category when the tag is
    /// category-semantic (the store's view of the file must agree with the
    /// event the test fires).
    pub fn apply_tag(&self, id: i64, tag: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.files.get_mut(&FileId(id)) {
            record.tags.push(tag.to_string());
            if let Some(category) = category_for_tag_name(tag) {
                record.category = category;
            }
        }
    }

    pub fn retract_tag(&self, id: i64, tag: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner.files.get_mut(&FileId(id)) {
            record.tags.retain(|t| t != tag);
            if category_for_tag_name(tag).is_some() {
                record.category = record
                    .tags
                    .iter()
                    .find_map(|t| category_for_tag_name(t))
                    .unwrap_or(Category::Zero);
            }
        }
    }

    pub fn set_path_analyzed(&self, path: &str, analyzed: bool) {
        let mut inner = self.inner.lock().unwrap();
        if analyzed {
            inner.analyzed_paths.insert(path.to_string());
        } else {
            inner.analyzed_paths.remove(path);
        }
    }

    pub fn add_untracked_mime(&self, mime: &str, ids: &[i64]) {
        self.inner.lock().unwrap().untracked_mimes.push((
            Some(mime.to_string()),
            ids.iter().map(|id| FileId(*id)).collect(),
        ));
    }

    pub fn add_untracked_tag(&self, tag: &str, id: i64) {
        self.inner
            .lock()
            .unwrap()
            .untracked_tags
            .entry(tag.to_string())
            .or_default()
            .push(FileId(id));
    }

    pub fn set_open(&self, open: bool) {
        self.inner.lock().unwrap().open = open;
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.inner.lock().unwrap().fail_queries = fail;
    }

    pub fn seen_writes(&self) -> Vec<(GroupKey, bool)> {
        self.inner.lock().unwrap().seen_writes.clone()
    }

    pub fn persisted_seen(&self, key: &GroupKey) -> bool {
        self.inner.lock().unwrap().seen.get(key).copied().unwrap_or(false)
    }

    pub fn value_query_count(&self) -> usize {
        self.inner.lock().unwrap().value_queries
    }

    fn check_failure(inner: &CaseData) -> StoreResult<()> {
        if inner.fail_queries {
            Err(StoreError::Query("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

fn category_for_tag_name(tag: &str) -> Option<Category> {
    let idx: usize = tag.strip_prefix("Category:")?.parse().ok()?;
    Category::ALL.get(idx).copied()
}

fn scope_matches(key_ds: Option<DataSourceId>, file_ds: Option<DataSourceId>) -> bool {
    key_ds.is_none() || key_ds == file_ds
}

impl GalleryStore for MemCase {
    fn file_by_id(&self, id: FileId) -> StoreResult<FileRecord> {
        let inner = self.inner.lock().unwrap();
        Self::check_failure(&inner)?;
        inner.files.get(&id).cloned().ok_or(StoreError::FileNotFound(id))
    }

    fn file_ids_in_group(&self, key: &GroupKey) -> StoreResult<HashSet<FileId>> {
        let inner = self.inner.lock().unwrap();
        Self::check_failure(&inner)?;
        Ok(inner
            .files
            .values()
            .filter(|f| scope_matches(key.data_source, f.data_source))
            .filter(|f| f.values(key.attribute).contains(&key.value))
            .map(|f| f.id)
            .collect())
    }

    fn is_group_analyzed(&self, key: &GroupKey) -> StoreResult<bool> {
        let inner = self.inner.lock().unwrap();
        Self::check_failure(&inner)?;
        match &key.value {
            GroupValue::Path(p) => Ok(inner.analyzed_paths.contains(p)),
            _ => Ok(true),
        }
    }

    fn is_group_seen(&self, key: &GroupKey) -> StoreResult<bool> {
        let inner = self.inner.lock().unwrap();
        Self::check_failure(&inner)?;
        Ok(inner.seen.get(key).copied().unwrap_or(false))
    }

    fn set_group_seen(&self, key: &GroupKey, seen: bool) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_failure(&inner)?;
        inner.seen.insert(key.clone(), seen);
        inner.seen_writes.push((key.clone(), seen));
        Ok(())
    }

    fn is_tracked(&self, id: FileId) -> bool {
        self.inner.lock().unwrap().files.contains_key(&id)
    }

    fn find_values_for_attribute(
        &self,
        attribute: Attribute,
        _sort_by: SortBy,
        _order: SortOrder,
        data_source: Option<DataSourceId>,
    ) -> StoreResult<Vec<(Option<DataSourceId>, GroupValue)>> {
        let mut inner = self.inner.lock().unwrap();
        inner.value_queries += 1;
        Self::check_failure(&inner)?;
        let mut distinct = BTreeSet::new();
        for f in inner.files.values() {
            if !scope_matches(data_source, f.data_source) {
                continue;
            }
            for value in f.values(attribute) {
                distinct.insert((f.data_source, value));
            }
        }
        Ok(distinct.into_iter().collect())
    }

    fn hash_set_names(&self) -> StoreResult<BTreeSet<String>> {
        let inner = self.inner.lock().unwrap();
        Self::check_failure(&inner)?;
        Ok(inner
            .files
            .values()
            .flat_map(|f| f.hash_sets.iter().cloned())
            .collect())
    }

    fn mime_types_in_use(&self) -> StoreResult<Vec<(Option<String>, Vec<FileId>)>> {
        let inner = self.inner.lock().unwrap();
        Self::check_failure(&inner)?;
        let mut by_mime: BTreeMap<Option<String>, Vec<FileId>> = BTreeMap::new();
        for f in inner.files.values() {
            by_mime.entry(f.mime_type.clone()).or_default().push(f.id);
        }
        let mut rows: Vec<_> = by_mime.into_iter().collect();
        rows.extend(inner.untracked_mimes.iter().cloned());
        Ok(rows)
    }

    fn all_file_ids_except(&self, excluded: &HashSet<FileId>) -> StoreResult<HashSet<FileId>> {
        let inner = self.inner.lock().unwrap();
        Self::check_failure(&inner)?;
        Ok(inner
            .files
            .keys()
            .filter(|id| !excluded.contains(id))
            .copied()
            .collect())
    }

    fn is_open(&self) -> bool {
        self.inner.lock().unwrap().open
    }
}

impl TagSource for MemCase {
    fn is_category_tag(&self, tag: &str) -> bool {
        category_for_tag_name(tag).is_some()
    }

    fn category_for_tag(&self, tag: &str) -> Option<Category> {
        category_for_tag_name(tag)
    }

    fn tag_for_category(&self, category: Category) -> String {
        let idx = Category::ALL.iter().position(|c| *c == category).unwrap();
        format!("Category:{idx}")
    }

    fn tag_names_in_use(&self) -> StoreResult<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        Self::check_failure(&inner)?;
        let names: BTreeSet<String> = inner
            .files
            .values()
            .flat_map(|f| f.tags.iter().cloned())
            .collect();
        Ok(names.into_iter().collect())
    }

    fn category_tag_names(&self) -> StoreResult<Vec<String>> {
        Ok((0..Category::ALL.len()).map(|i| format!("Category:{i}")).collect())
    }

    fn files_with_tag(&self, tag: &str) -> StoreResult<Vec<FileId>> {
        let inner = self.inner.lock().unwrap();
        Self::check_failure(&inner)?;
        let mut ids: Vec<FileId> = inner
            .files
            .values()
            .filter(|f| f.tags.iter().any(|t| t == tag))
            .map(|f| f.id)
            .collect();
        if let Some(extra) = inner.untracked_tags.get(tag) {
            ids.extend(extra.iter().copied());
        }
        Ok(ids)
    }
}

/// Watcher that records every lifecycle transition.
#[derive(Default)]
pub struct RecordingWatcher {
    pub registered: Mutex<Vec<GroupKey>>,
    pub unregistered: Mutex<Vec<GroupKey>>,
    pub category_changes: Mutex<Vec<Vec<FileId>>>,
}

impl CategoryWatcher for RecordingWatcher {
    fn register(&self, group: &Arc<Group>) {
        self.registered.lock().unwrap().push(group.key().clone());
    }

    fn unregister(&self, group: &Arc<Group>) {
        self.unregistered.lock().unwrap().push(group.key().clone());
    }

    fn file_categories_changed(&self, ids: &[FileId]) {
        self.category_changes.lock().unwrap().push(ids.to_vec());
    }
}

/// View-state sink that records every advance and tracks the current group.
#[derive(Default)]
pub struct RecordingSink {
    pub current: Mutex<Option<GroupKey>>,
    pub advanced: Mutex<Vec<Option<GroupKey>>>,
}

impl ViewStateSink for RecordingSink {
    fn current_group(&self) -> Option<GroupKey> {
        self.current.lock().unwrap().clone()
    }

    fn advance(&self, group: Option<Arc<Group>>) {
        let key = group.map(|g| g.key().clone());
        *self.current.lock().unwrap() = key.clone();
        self.advanced.lock().unwrap().push(key);
    }
}

/// Spin until the predicate holds or the timeout expires. Returns the final
/// predicate outcome so asserts read naturally.
pub fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    pred()
}
