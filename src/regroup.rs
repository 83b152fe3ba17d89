//! Full recompute of the group set for one configuration
//!
//! A `RegroupTask` is a cancellable, progress-reporting unit of work that
//! runs on the manager's single background worker. It clears both sorted
//! views (the group map is kept so existing groups are refreshed in place),
//! enumerates the distinct values of the grouping attribute, materializes a
//! group per value, and finally reconciles which group the UI should be
//! displaying. Cancellation is cooperative: the token is checked before
//! each unit of work, and a cancelled task simply stops contributing — the
//! replacing task becomes authoritative for the final state.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::data::GroupKey;
use crate::error::{RegroupError, RegroupResult};
use crate::manager::{Collaborators, GroupConfig, GroupsState};
use crate::resolve;

/// Lifecycle of a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Pending = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
    Failed = 4,
}

impl TaskState {
    fn from_u8(v: u8) -> TaskState {
        match v {
            0 => TaskState::Pending,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            3 => TaskState::Cancelled,
            _ => TaskState::Failed,
        }
    }
}

/// Shared handle to an in-flight rebuild: the cancellation token plus the
/// observable task state. The manager swaps its "current task" handle under
/// its lock and cancels the outgoing one before installing the incoming one.
#[derive(Debug, Clone)]
pub struct RegroupHandle {
    cancel: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl RegroupHandle {
    pub fn new() -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            state: Arc::new(AtomicU8::new(TaskState::Pending as u8)),
        }
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: TaskState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }
}

impl Default for RegroupHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic `(done, total)` pair backing the manager's 0.0..=1.0 progress
/// observable. A zero total reads as complete.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    done: AtomicUsize,
    total: AtomicUsize,
}

impl ProgressCounters {
    /// Reset for a freshly launched rebuild: 0 of 1 until the real total is
    /// known, so observers see "in progress" immediately.
    pub fn begin(&self) {
        self.done.store(0, Ordering::Relaxed);
        self.total.store(1, Ordering::Relaxed);
    }

    fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    fn set_done(&self, done: usize) {
        self.done.store(done, Ordering::Relaxed);
    }

    /// Pin the observable at 1.0, whatever the outcome was.
    fn finish(&self) {
        let total = self.total.load(Ordering::Relaxed).max(1);
        self.total.store(total, Ordering::Relaxed);
        self.done.store(total, Ordering::Relaxed);
    }

    pub fn ratio(&self) -> f64 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            1.0
        } else {
            (self.done.load(Ordering::Relaxed) as f64 / total as f64).min(1.0)
        }
    }
}

/// Progress snapshot handed to the optional callback after each unit of work.
#[derive(Debug, Clone)]
pub struct RegroupProgress {
    pub done: usize,
    pub total: usize,
    /// Display form of the value just materialized
    pub current_value: Option<String>,
}

impl RegroupProgress {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f64 / self.total as f64
        }
    }
}

/// One full rebuild for a `(data source, attribute, sort, order)`
/// configuration snapshot.
pub(crate) struct RegroupTask {
    config: GroupConfig,
    handle: RegroupHandle,
}

impl RegroupTask {
    pub(crate) fn new(config: GroupConfig, handle: RegroupHandle) -> Self {
        Self { config, handle }
    }

    pub(crate) fn handle(&self) -> &RegroupHandle {
        &self.handle
    }

    /// Execute the rebuild against the manager's state. The manager lock is
    /// taken per unit of work, never for the whole scan, so the public API
    /// (including the cancel path) stays responsive while views remain
    /// consistent at every lock release.
    pub(crate) fn run(
        &self,
        state: &Mutex<GroupsState>,
        collab: &Collaborators,
        progress: &ProgressCounters,
    ) -> RegroupResult<()> {
        self.handle.set_state(TaskState::Running);
        let result = self.execute(state, collab, progress);
        progress.finish();
        match &result {
            Ok(()) => self.handle.set_state(TaskState::Completed),
            Err(RegroupError::Cancelled) => self.handle.set_state(TaskState::Cancelled),
            Err(_) => self.handle.set_state(TaskState::Failed),
        }
        result
    }

    fn execute(
        &self,
        state: &Mutex<GroupsState>,
        collab: &Collaborators,
        progress: &ProgressCounters,
    ) -> RegroupResult<()> {
        if self.handle.is_cancelled() {
            return Err(RegroupError::Cancelled);
        }
        info!(
            "Regroup: rebuilding by {} sorted by {:?}",
            self.config.group_by, self.config.sort_by
        );

        // Both views restart empty; the map is kept so groups that survive
        // the rebuild are updated in place and keep their listeners.
        {
            let mut st = state.lock().unwrap();
            st.analyzed.clear();
            st.unseen.clear();
        }

        let values = resolve::find_values_for_attribute(
            collab.store.as_ref(),
            collab.tags.as_ref(),
            self.config.group_by,
            self.config.sort_by,
            self.config.sort_order,
            self.config.data_source,
        )?;

        let total = values.len();
        progress.set_total(total);
        debug!("Regroup: {} distinct values to materialize", total);

        for (i, (data_source, value)) in values.into_iter().enumerate() {
            if self.handle.is_cancelled() {
                debug!("Regroup: cancelled after {} of {} groups", i, total);
                return Err(RegroupError::Cancelled);
            }
            let label = value.to_string();
            let key = GroupKey::new(self.config.group_by, value, data_source);
            {
                let mut st = state.lock().unwrap();
                st.populate_if_analyzed(&key, Some(&self.handle), collab);
            }
            progress.set_done(i + 1);
            if let Some(callback) = &collab.progress_callback {
                callback(RegroupProgress {
                    done: i + 1,
                    total,
                    current_value: Some(label),
                });
            }
        }

        let mut st = state.lock().unwrap();
        // the manager cancels the outgoing task under this lock before
        // installing its replacement, so a cancelled task must not claim
        // the rebuild finished or touch the display
        if self.handle.is_cancelled() {
            return Err(RegroupError::Cancelled);
        }
        st.regrouping = false;
        st.reconcile_display(collab);

        info!("Regroup: completed with {} groups", st.analyzed.len());
        Ok(())
    }
}
