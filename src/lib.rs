//! # Tessella
//!
//! An in-memory grouping engine for browsing large, continuously changing
//! media datasets. Partitions files into named groups keyed by a selectable
//! attribute and keeps two sorted views (all groups, unseen groups) current
//! as the dataset changes, reconciling full asynchronous rebuilds with
//! fine-grained incremental events.

pub mod data;
pub mod error;
pub mod events;
pub mod group;
pub mod manager;
pub mod regroup;
pub mod resolve;
pub mod sort;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export main API types
pub use data::{Attribute, Category, DataSourceId, FileId, FileRecord, GroupKey, GroupValue};
pub use error::{RegroupError, RegroupResult, StoreError, StoreResult};
pub use events::{EventBus, GalleryEvent};
pub use group::Group;
pub use manager::{GroupConfig, GroupManager, ProgressCallback};
pub use regroup::{RegroupProgress, TaskState};
pub use sort::{SortBy, SortOrder};
