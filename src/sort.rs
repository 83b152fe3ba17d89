//! Ordering strategy over groups: a sort criterion plus a direction

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::group::Group;

/// Criterion to order groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
	/// By the group's attribute value
	GroupByValue,
	/// By membership size
	FileCount,
	/// Review priority: unseen groups first, then larger groups
	Priority,
	/// All groups equal (keeps current order)
	None,
}

impl fmt::Display for SortBy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SortBy::GroupByValue => write!(f, "group value"),
			SortBy::FileCount => write!(f, "file count"),
			SortBy::Priority => write!(f, "priority"),
			SortBy::None => write!(f, "none"),
		}
	}
}

/// Sort direction. `Unsorted` is a deliberate fast path, distinct from
/// "ascending with a trivial key": no comparator runs at all, so existing
/// relative order is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
	Ascending,
	Descending,
	Unsorted,
}

/// Compare two groups under the given criterion, ascending.
fn compare_ascending(sort_by: SortBy, a: &Group, b: &Group) -> Ordering {
	match sort_by {
		SortBy::GroupByValue => a.key().value.cmp(&b.key().value),
		SortBy::FileCount => a.len().cmp(&b.len()),
		SortBy::Priority => {
			// unseen before seen, then bigger groups, then value as tiebreak
			(a.is_seen().cmp(&b.is_seen()))
				.then_with(|| b.len().cmp(&a.len()))
				.then_with(|| a.key().value.cmp(&b.key().value))
		}
		SortBy::None => Ordering::Equal,
	}
}

/// Compare two groups under the given criterion and direction. Descending
/// is the ascending outcome reversed, so the two directions are exact
/// mirrors for every criterion.
pub fn compare_groups(sort_by: SortBy, order: SortOrder, a: &Group, b: &Group) -> Ordering {
	match order {
		SortOrder::Ascending => compare_ascending(sort_by, a, b),
		SortOrder::Descending => compare_ascending(sort_by, a, b).reverse(),
		SortOrder::Unsorted => Ordering::Equal,
	}
}

/// Sort a view in place under the current policy. Stable, so an all-equal
/// comparison never reorders existing elements; `Unsorted` skips the sort
/// entirely.
pub fn sort_groups(groups: &mut [Arc<Group>], sort_by: SortBy, order: SortOrder) {
	if order == SortOrder::Unsorted || sort_by == SortBy::None {
		return;
	}
	groups.sort_by(|a, b| compare_groups(sort_by, order, a, b));
}
