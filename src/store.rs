//! Collaborator contracts the engine depends on
//!
//! The persistent file/tag store, the tag-naming subsystem, the category
//! change notifier, and the UI view-state layer are external to this crate
//! and specified only at their interface. All of them must be shareable
//! across the manager's worker thread.

use std::collections::{BTreeSet, HashSet};

use crate::data::{Attribute, Category, DataSourceId, FileId, FileRecord, GroupKey, GroupValue};
use crate::error::StoreResult;
use crate::group::Group;
use crate::sort::{SortBy, SortOrder};

/// The persistent file store, queried for raw attribute values and file ids.
pub trait GalleryStore: Send + Sync {
	/// Look up a file by id.
	fn file_by_id(&self, id: FileId) -> StoreResult<FileRecord>;

	/// File ids in the group named by the key. Used for attributes without
	/// special membership rules (path, hash-set, analyzed).
	fn file_ids_in_group(&self, key: &GroupKey) -> StoreResult<HashSet<FileId>>;

	/// Whether the store considers the group fully analyzed. Only
	/// meaningful for the path attribute; other attributes are always
	/// materialized.
	fn is_group_analyzed(&self, key: &GroupKey) -> StoreResult<bool>;

	fn is_group_seen(&self, key: &GroupKey) -> StoreResult<bool>;

	/// Persist the seen flag. The engine writes through here before
	/// mutating its in-memory state.
	fn set_group_seen(&self, key: &GroupKey, seen: bool) -> StoreResult<()>;

	/// Whether the file id is tracked by this engine's dataset. Membership
	/// queries that aggregate over the wider store filter through this.
	fn is_tracked(&self, id: FileId) -> bool;

	/// Distinct values for an attribute, scoped by data source, as
	/// `(data source, value)` pairs. The generic enumeration used when no
	/// special rule applies.
	fn find_values_for_attribute(
		&self,
		attribute: Attribute,
		sort_by: SortBy,
		order: SortOrder,
		data_source: Option<DataSourceId>,
	) -> StoreResult<Vec<(Option<DataSourceId>, GroupValue)>>;

	/// Distinct hash-set names, ordered.
	fn hash_set_names(&self) -> StoreResult<BTreeSet<String>>;

	/// MIME-type aggregation: each detected type with the ids carrying it.
	/// Ids not tracked by this engine must be filtered out by the caller.
	fn mime_types_in_use(&self) -> StoreResult<Vec<(Option<String>, Vec<FileId>)>>;

	/// All tracked file ids except the given set. Backs the uncategorized
	/// group, whose membership is "everything not otherwise categorized".
	fn all_file_ids_except(&self, excluded: &HashSet<FileId>) -> StoreResult<HashSet<FileId>>;

	/// Drop any cached hash-set membership for the file, called when the
	/// file is updated.
	fn invalidate_hash_sets_for_file(&self, _id: FileId) {}

	/// Whether a dataset is open. Regrouping against a closed store is a
	/// no-op, not an error.
	fn is_open(&self) -> bool {
		true
	}
}

/// Tag-naming subsystem: classifies tag names and resolves their category
/// semantics. The engine never parses tag names itself.
pub trait TagSource: Send + Sync {
	fn is_category_tag(&self, tag: &str) -> bool;

	/// Map a category-semantic tag name to its category.
	fn category_for_tag(&self, tag: &str) -> Option<Category>;

	/// The tag name carrying the given category.
	fn tag_for_category(&self, category: Category) -> String;

	/// All tag names currently in use, category tags included.
	fn tag_names_in_use(&self) -> StoreResult<Vec<String>>;

	/// The category-semantic tag names.
	fn category_tag_names(&self) -> StoreResult<Vec<String>>;

	/// Ids of files carrying the tag, unfiltered.
	fn files_with_tag(&self, tag: &str) -> StoreResult<Vec<FileId>>;
}

/// Category-change notification source. Each materialized group registers
/// on creation and unregisters on eviction or reset, exactly once per
/// lifecycle transition.
pub trait CategoryWatcher: Send + Sync {
	fn register(&self, group: &std::sync::Arc<Group>);
	fn unregister(&self, group: &std::sync::Arc<Group>);

	/// Fired after bulk file updates so category counts can refresh.
	fn file_categories_changed(&self, _ids: &[FileId]) {}
}

/// The UI view-state layer: which group is on screen, and where to point it
/// after a rebuild.
pub trait ViewStateSink: Send + Sync {
	/// The key of the currently displayed group, if any.
	fn current_group(&self) -> Option<GroupKey>;

	/// Display the given group, or clear the display on `None`.
	fn advance(&self, group: Option<std::sync::Arc<Group>>);
}
