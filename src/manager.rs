//! Group manager: configuration, the group map, both sorted views, and the
//! rebuild lifecycle
//!
//! All public operations serialize on one exclusive lock covering the
//! configuration, the group map, and both views. Background work (full
//! rebuilds, seen-state persistence, queued events) runs on a single
//! dedicated worker thread fed by a job channel, so no two background jobs
//! ever execute concurrently and incremental events arriving during a
//! rebuild are applied after it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_channel as channel;
use futures_lite::future;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::data::{Attribute, DataSourceId, FileId, FileRecord, GroupKey, GroupValue};
use crate::events::{EventBus, GalleryEvent};
use crate::group::Group;
use crate::regroup::{ProgressCounters, RegroupHandle, RegroupProgress, RegroupTask};
use crate::resolve;
use crate::sort::{self, SortBy, SortOrder};
use crate::store::{CategoryWatcher, GalleryStore, TagSource, ViewStateSink};

/// Current grouping/sorting configuration. Mutated only through
/// [`GroupManager::regroup`] and [`GroupManager::reset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub group_by: Attribute,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    /// `None` means all data sources
    pub data_source: Option<DataSourceId>,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            group_by: Attribute::Path,
            sort_by: SortBy::Priority,
            sort_order: SortOrder::Ascending,
            data_source: None,
        }
    }
}

/// Callback invoked after each rebuild unit of work.
pub type ProgressCallback = Arc<dyn Fn(RegroupProgress) + Send + Sync>;

/// The external collaborators the engine runs against.
pub(crate) struct Collaborators {
    pub(crate) store: Arc<dyn GalleryStore>,
    pub(crate) tags: Arc<dyn TagSource>,
    pub(crate) watcher: Arc<dyn CategoryWatcher>,
    pub(crate) view: Arc<dyn ViewStateSink>,
    pub(crate) progress_callback: Option<ProgressCallback>,
}

/// Everything behind the manager's exclusive lock: configuration, the group
/// map, both sorted views, and the current-rebuild handle. Methods here are
/// only ever called with the lock held, so they never lock themselves.
pub(crate) struct GroupsState {
    pub(crate) config: GroupConfig,
    /// All materialized groups, keyed by identity
    pub(crate) group_map: HashMap<GroupKey, Arc<Group>>,
    /// Sorted view of all materialized groups
    pub(crate) analyzed: Vec<Arc<Group>>,
    /// Sorted view of the groups not yet reviewed
    pub(crate) unseen: Vec<Arc<Group>>,
    pub(crate) regrouping: bool,
    pub(crate) current_task: Option<RegroupHandle>,
}

impl GroupsState {
    pub(crate) fn new(config: GroupConfig) -> Self {
        Self {
            config,
            group_map: HashMap::new(),
            analyzed: Vec::new(),
            unseen: Vec::new(),
            regrouping: false,
            current_task: None,
        }
    }

    fn sort_analyzed(&mut self) {
        sort::sort_groups(&mut self.analyzed, self.config.sort_by, self.config.sort_order);
    }

    fn sort_unseen(&mut self) {
        sort::sort_groups(&mut self.unseen, self.config.sort_by, self.config.sort_order);
    }

    fn sort_views(&mut self) {
        self.sort_analyzed();
        self.sort_unseen();
    }

    /// Route a group into or out of the unseen view based on its seen flag,
    /// keeping the view sorted. Only materialized groups may enter the
    /// unseen view: a stale handle to an evicted group (the UI can hold one
    /// past eviction) must not resurrect it here.
    pub(crate) fn update_unseen(&mut self, group: &Arc<Group>, seen: bool) {
        if seen {
            self.unseen.retain(|g| g.key() != group.key());
        } else if self.analyzed.iter().any(|g| g.key() == group.key())
            && !self.unseen.iter().any(|g| g.key() == group.key())
        {
            self.unseen.push(group.clone());
        }
        self.sort_unseen();
    }

    /// The group keys the given file belongs to under the current
    /// configuration. When grouping by tags, category-semantic tag values
    /// are excluded: those files are the category attribute's concern.
    fn keys_for_record(&self, record: &FileRecord, tags: &dyn TagSource) -> HashSet<GroupKey> {
        let mut keys = HashSet::new();
        for value in record.values(self.config.group_by) {
            if self.config.group_by == Attribute::Tags {
                if let GroupValue::Tag(name) = &value {
                    if tags.is_category_tag(name) {
                        continue;
                    }
                }
            }
            keys.insert(GroupKey::new(
                self.config.group_by,
                value,
                self.config.data_source,
            ));
        }
        keys
    }

    /// Materialize the group for a key, or refresh it in place if it
    /// already exists (preserving its identity for registered listeners).
    ///
    /// A no-op when the requesting rebuild task has been cancelled — stale
    /// work must not mutate state. For the path attribute a group only
    /// materializes once the store reports it fully analyzed; every other
    /// attribute is always visible because its complete membership cannot
    /// be known in advance.
    pub(crate) fn populate_if_analyzed(
        &mut self,
        key: &GroupKey,
        task: Option<&RegroupHandle>,
        collab: &Collaborators,
    ) -> Option<Arc<Group>> {
        if task.is_some_and(RegroupHandle::is_cancelled) {
            return None;
        }

        if key.attribute == Attribute::Path {
            match collab.store.is_group_analyzed(key) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    warn!("GroupManager: analyzed check failed for {key}: {e}");
                    return None;
                }
            }
        }

        let file_ids = match resolve::file_ids_in_group(collab.store.as_ref(), collab.tags.as_ref(), key)
        {
            Ok(ids) => ids,
            Err(e) => {
                error!("GroupManager: failed to get files for group {key}: {e}");
                return None;
            }
        };
        let seen = match collab.store.is_group_seen(key) {
            Ok(seen) => seen,
            Err(e) => {
                error!("GroupManager: failed to get seen state for group {key}: {e}");
                return None;
            }
        };

        let group = if let Some(existing) = self.group_map.get(key).cloned() {
            existing.set_files(file_ids);
            existing.set_seen(seen);
            existing
        } else {
            let group = Arc::new(Group::new(key.clone(), file_ids, seen));
            collab.watcher.register(&group);
            self.group_map.insert(key.clone(), group.clone());
            group
        };

        if !self.analyzed.iter().any(|g| g.key() == key) {
            self.analyzed.push(group.clone());
            self.sort_analyzed();
        }
        self.update_unseen(&group, seen);
        Some(group)
    }

    /// Make sure the UI ends up pointing at some valid group (or
    /// explicitly none), never at a stale or vanished one. A displayed
    /// group is still valid when its attribute matches the configuration
    /// and it is not scoped to a different data source; otherwise the
    /// replacement is the first unseen group, else the first analyzed
    /// group, else nothing.
    pub(crate) fn reconcile_display(&self, collab: &Collaborators) {
        let viewed = collab.view.current_group();
        let still_valid = viewed.as_ref().is_some_and(|key| {
            key.attribute == self.config.group_by
                && !(self.config.data_source.is_some()
                    && key.data_source != self.config.data_source)
        });
        if !still_valid {
            let replacement = self.unseen.first().or_else(|| self.analyzed.first()).cloned();
            collab.view.advance(replacement);
        }
    }

    /// Remove a file from the named group. Empty non-category groups are
    /// evicted from the map and both views; category groups persist because
    /// categories are a fixed enumeration. If no group exists for the key,
    /// try to materialize one instead: removing the last un-analyzed file
    /// can make a previously incomplete group newly complete.
    pub(crate) fn remove_from_group(
        &mut self,
        key: &GroupKey,
        file_id: FileId,
        collab: &Collaborators,
    ) -> Option<Arc<Group>> {
        if let Some(group) = self.group_map.get(key).cloned() {
            let remaining = group.remove_file(file_id);
            if remaining == 0 && key.attribute != Attribute::Category {
                self.evict(&group, collab);
            } else {
                self.sort_views();
            }
            Some(group)
        } else {
            self.populate_if_analyzed(key, None, collab)
        }
    }

    fn evict(&mut self, group: &Arc<Group>, collab: &Collaborators) {
        debug!("GroupManager: evicting empty group {}", group.key());
        self.group_map.remove(group.key());
        self.analyzed.retain(|g| g.key() != group.key());
        self.unseen.retain(|g| g.key() != group.key());
        self.sort_views();
        collab.watcher.unregister(group);
    }

    /// Add a file to the group, materializing it first if necessary.
    fn add_file_to_group(
        &mut self,
        group: Option<Arc<Group>>,
        key: &GroupKey,
        file_id: FileId,
        collab: &Collaborators,
    ) {
        let group = group.or_else(|| self.populate_if_analyzed(key, None, collab));
        if let Some(group) = group {
            group.add_file(file_id);
            self.sort_views();
        }
    }
}

enum Job {
    Regroup(RegroupTask),
    SetSeen {
        group: Arc<Group>,
        seen: bool,
        ack: channel::Sender<()>,
    },
    Event(GalleryEvent),
}

struct ManagerInner {
    state: Mutex<GroupsState>,
    collab: Collaborators,
    progress: ProgressCounters,
}

/// Orchestrator for the grouping engine. See the module docs for the
/// locking and scheduling model.
pub struct GroupManager {
    inner: Arc<ManagerInner>,
    jobs: channel::Sender<Job>,
}

impl GroupManager {
    pub fn new(
        store: Arc<dyn GalleryStore>,
        tags: Arc<dyn TagSource>,
        watcher: Arc<dyn CategoryWatcher>,
        view: Arc<dyn ViewStateSink>,
    ) -> Self {
        Self::spawn(Collaborators {
            store,
            tags,
            watcher,
            view,
            progress_callback: None,
        })
    }

    /// Like [`GroupManager::new`], with a callback invoked after each
    /// rebuild unit of work.
    pub fn new_with_progress(
        store: Arc<dyn GalleryStore>,
        tags: Arc<dyn TagSource>,
        watcher: Arc<dyn CategoryWatcher>,
        view: Arc<dyn ViewStateSink>,
        progress_callback: ProgressCallback,
    ) -> Self {
        Self::spawn(Collaborators {
            store,
            tags,
            watcher,
            view,
            progress_callback: Some(progress_callback),
        })
    }

    fn spawn(collab: Collaborators) -> Self {
        let inner = Arc::new(ManagerInner {
            state: Mutex::new(GroupsState::new(GroupConfig::default())),
            collab,
            progress: ProgressCounters::default(),
        });
        let (jobs, rx) = channel::unbounded::<Job>();

        // Single worker: rebuilds, seen persistence, and queued events all
        // serialize here. The loop ends when the manager (the only sender)
        // is dropped.
        let worker = inner.clone();
        std::thread::spawn(move || {
            future::block_on(async move {
                while let Ok(job) = rx.recv().await {
                    worker.run_job(job);
                }
                debug!("GroupManager: worker stopped");
            });
        });

        Self { inner, jobs }
    }

    /// Read-only snapshot of all materialized groups, in sorted order.
    pub fn analyzed_groups(&self) -> Vec<Arc<Group>> {
        self.inner.state.lock().unwrap().analyzed.clone()
    }

    /// Read-only snapshot of the unseen groups, in sorted order.
    pub fn unseen_groups(&self) -> Vec<Arc<Group>> {
        self.inner.state.lock().unwrap().unseen.clone()
    }

    pub fn config(&self) -> GroupConfig {
        self.inner.state.lock().unwrap().config.clone()
    }

    pub fn is_regrouping(&self) -> bool {
        self.inner.state.lock().unwrap().regrouping
    }

    /// Rebuild progress in `0.0..=1.0`.
    pub fn regroup_progress(&self) -> f64 {
        self.inner.progress.ratio()
    }

    /// The group for the key, or `None` if it has not been materialized.
    pub fn group_for_key(&self, key: &GroupKey) -> Option<Arc<Group>> {
        self.inner.state.lock().unwrap().group_map.get(key).cloned()
    }

    /// The keys of the group(s) the file is part of under the current
    /// configuration.
    pub fn group_keys_for_file(&self, file: &FileRecord) -> HashSet<GroupKey> {
        let st = self.inner.state.lock().unwrap();
        st.keys_for_record(file, self.inner.collab.tags.as_ref())
    }

    /// Resolve a file id through the store, then compute its group keys.
    /// Lookup failure is logged and yields the empty set.
    pub fn group_keys_for_file_id(&self, id: FileId) -> HashSet<GroupKey> {
        let st = self.inner.state.lock().unwrap();
        match self.inner.collab.store.file_by_id(id) {
            Ok(record) => st.keys_for_record(&record, self.inner.collab.tags.as_ref()),
            Err(e) => {
                error!("GroupManager: failed to load file {id}: {e}");
                HashSet::new()
            }
        }
    }

    /// Adopt a new configuration. If the data source or grouping attribute
    /// changed (or `force` is set) this cancels any rebuild in flight and
    /// launches a new one; a sort-only change re-sorts both views in memory
    /// without touching the store.
    pub fn regroup(
        &self,
        data_source: Option<DataSourceId>,
        group_by: Attribute,
        sort_by: SortBy,
        sort_order: SortOrder,
        force: bool,
    ) {
        if !self.inner.collab.store.is_open() {
            return;
        }

        let mut st = self.inner.state.lock().unwrap();
        if data_source != st.config.data_source || group_by != st.config.group_by || force {
            st.config = GroupConfig {
                group_by,
                sort_by,
                sort_order,
                data_source,
            };
            if let Some(previous) = st.current_task.take() {
                previous.cancel();
            }
            st.regrouping = true;
            let handle = RegroupHandle::new();
            st.current_task = Some(handle.clone());
            self.inner.progress.begin();
            let task = RegroupTask::new(st.config.clone(), handle);
            drop(st);
            info!("GroupManager: regrouping by {group_by}");
            let _ = self.jobs.send_blocking(Job::Regroup(task));
        } else {
            // only sort criteria changed: O(n log n) in memory, no store scan
            st.config.sort_by = sort_by;
            st.config.sort_order = sort_order;
            st.sort_views();
        }
    }

    /// Remove a file from the named group (see
    /// [`GroupsState::remove_from_group`] for the eviction rules).
    pub fn remove_from_group(&self, key: &GroupKey, file_id: FileId) -> Option<Arc<Group>> {
        let mut st = self.inner.state.lock().unwrap();
        st.remove_from_group(key, file_id, &self.inner.collab)
    }

    /// Persist and apply a group's seen flag on the worker. Write-through:
    /// the store is updated before the in-memory flag, so the two cannot
    /// diverge past a crash. Returns an ack handle; the caller is never
    /// blocked.
    pub fn set_group_seen(&self, group: Arc<Group>, seen: bool) -> channel::Receiver<()> {
        let (ack, done) = channel::bounded(1);
        let _ = self.jobs.send_blocking(Job::SetSeen { group, seen, ack });
        done
    }

    pub fn handle_tag_added(&self, file_id: FileId, tag: &str) {
        self.inner.on_tag_added(file_id, tag);
    }

    pub fn handle_tag_deleted(&self, file_id: FileId, tag: &str) {
        self.inner.on_tag_deleted(file_id, tag);
    }

    pub fn handle_files_removed(&self, ids: &[FileId]) {
        self.inner.on_files_removed(ids);
    }

    pub fn handle_files_updated(&self, ids: &[FileId]) {
        self.inner.on_files_updated(ids);
    }

    /// Queue an event on the worker instead of applying it synchronously:
    /// events posted during a rebuild are applied after it completes.
    pub fn post_event(&self, event: GalleryEvent) {
        let _ = self.jobs.send_blocking(Job::Event(event));
    }

    /// Pump a bus subscription into the worker queue.
    pub fn attach_bus(&self, bus: &Arc<EventBus>) {
        let rx = bus.subscribe();
        let jobs = self.jobs.clone();
        std::thread::spawn(move || {
            future::block_on(async move {
                while let Ok(event) = rx.recv().await {
                    if jobs.send(Job::Event(event)).await.is_err() {
                        break;
                    }
                }
            });
        });
    }

    /// Cancel any active rebuild, restore the default configuration,
    /// unregister every group from the category watcher, and clear all
    /// state. Used on dataset close.
    pub fn reset(&self) {
        info!("GroupManager: reset");
        let mut st = self.inner.state.lock().unwrap();
        if let Some(task) = st.current_task.take() {
            task.cancel();
            st.regrouping = false;
        }
        st.config = GroupConfig {
            group_by: Attribute::Path,
            sort_by: SortBy::GroupByValue,
            sort_order: SortOrder::Ascending,
            data_source: None,
        };
        for group in st.group_map.values() {
            self.inner.collab.watcher.unregister(group);
        }
        st.group_map.clear();
        st.analyzed.clear();
        st.unseen.clear();
    }
}

impl ManagerInner {
    fn run_job(&self, job: Job) {
        match job {
            Job::Regroup(task) => {
                match task.run(&self.state, &self.collab, &self.progress) {
                    Ok(()) => {}
                    // cancellation is a normal, silent outcome; the
                    // replacing task owns the regrouping flag
                    Err(crate::error::RegroupError::Cancelled) => {
                        debug!("GroupManager: regroup cancelled")
                    }
                    Err(e) => {
                        warn!("GroupManager: regroup failed: {e}");
                        // a failed rebuild behaves like one over empty
                        // results: the display still gets reconciled with
                        // whatever state was built before the failure
                        if !task.handle().is_cancelled() {
                            let mut st = self.state.lock().unwrap();
                            st.regrouping = false;
                            st.reconcile_display(&self.collab);
                        }
                    }
                }
            }
            Job::SetSeen { group, seen, ack } => {
                self.apply_seen(&group, seen);
                let _ = ack.try_send(());
            }
            Job::Event(event) => self.dispatch_event(event),
        }
    }

    fn dispatch_event(&self, event: GalleryEvent) {
        match event {
            GalleryEvent::TagAdded { file_id, tag } => self.on_tag_added(file_id, &tag),
            GalleryEvent::TagDeleted { file_id, tag } => self.on_tag_deleted(file_id, &tag),
            GalleryEvent::FilesUpdated(ids) => self.on_files_updated(&ids),
            GalleryEvent::FilesRemoved(ids) => self.on_files_removed(&ids),
        }
    }

    fn apply_seen(&self, group: &Arc<Group>, seen: bool) {
        // write-through: persist first, mutate memory only on success
        match self.collab.store.set_group_seen(group.key(), seen) {
            Ok(()) => {
                let mut st = self.state.lock().unwrap();
                group.set_seen(seen);
                st.update_unseen(group, seen);
            }
            Err(e) => error!("GroupManager: error marking group {} seen: {e}", group.key()),
        }
    }

    /// The key the added/deleted tag maps to under the current grouping,
    /// or `None` when the event is irrelevant to it. Category tags belong
    /// to the category attribute; all other tags to the tags attribute.
    fn key_for_tag_event(&self, st: &GroupsState, tag: &str) -> Option<GroupKey> {
        let tags = self.collab.tags.as_ref();
        match st.config.group_by {
            Attribute::Category if tags.is_category_tag(tag) => {
                let category = tags.category_for_tag(tag)?;
                Some(GroupKey::new(
                    Attribute::Category,
                    GroupValue::Category(category),
                    st.config.data_source,
                ))
            }
            Attribute::Tags if !tags.is_category_tag(tag) => Some(GroupKey::new(
                Attribute::Tags,
                GroupValue::Tag(tag.to_string()),
                st.config.data_source,
            )),
            _ => None,
        }
    }

    fn on_tag_added(&self, file_id: FileId, tag: &str) {
        let mut st = self.state.lock().unwrap();
        let Some(new_key) = self.key_for_tag_event(&st, tag) else {
            return;
        };
        if new_key.attribute == Attribute::Category {
            // a file has exactly one category: drop it from every other group
            let others: Vec<GroupKey> = st
                .group_map
                .keys()
                .filter(|k| **k != new_key)
                .cloned()
                .collect();
            for old_key in others {
                st.remove_from_group(&old_key, file_id, &self.collab);
            }
        }
        let existing = st.group_map.get(&new_key).cloned();
        st.add_file_to_group(existing, &new_key, file_id, &self.collab);
    }

    fn on_tag_deleted(&self, file_id: FileId, tag: &str) {
        let mut st = self.state.lock().unwrap();
        let Some(key) = self.key_for_tag_event(&st, tag) else {
            return;
        };
        st.remove_from_group(&key, file_id, &self.collab);
    }

    fn on_files_removed(&self, ids: &[FileId]) {
        let mut st = self.state.lock().unwrap();
        for id in ids {
            let keys = match self.collab.store.file_by_id(*id) {
                Ok(record) => st.keys_for_record(&record, self.collab.tags.as_ref()),
                Err(e) => {
                    error!("GroupManager: failed to load file {id}: {e}");
                    continue;
                }
            };
            for key in keys {
                st.remove_from_group(&key, *id, &self.collab);
            }
        }
    }

    fn on_files_updated(&self, ids: &[FileId]) {
        {
            let mut st = self.state.lock().unwrap();
            for id in ids {
                self.collab.store.invalidate_hash_sets_for_file(*id);
                let keys = match self.collab.store.file_by_id(*id) {
                    Ok(record) => st.keys_for_record(&record, self.collab.tags.as_ref()),
                    Err(e) => {
                        error!("GroupManager: failed to load file {id}: {e}");
                        continue;
                    }
                };
                for key in keys {
                    let existing = st.group_map.get(&key).cloned();
                    st.add_file_to_group(existing, &key, *id, &self.collab);
                }
            }
        }
        // fired for the whole batch so category counts refresh during
        // initial population as well
        self.collab.watcher.file_categories_changed(ids);
    }
}
