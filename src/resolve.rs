//! Per-attribute enumeration and membership rules
//!
//! Most attributes answer "which groups exist" and "which files are in this
//! group" with a straight store query, but category, tags, and MIME type
//! each have their own enumeration rule. The dispatch lives here as a
//! closed set of match arms so callers never branch on attribute kind.

use std::collections::HashSet;

use tracing::debug;

use crate::data::{Attribute, Category, DataSourceId, FileId, GroupKey, GroupValue};
use crate::error::StoreResult;
use crate::sort::{SortBy, SortOrder};
use crate::store::{GalleryStore, TagSource};

/// Enumerate the distinct attribute values that exist right now, scoped by
/// data source, as `(data source, value)` pairs. These are the groups a
/// rebuild will materialize, in enumeration order.
pub fn find_values_for_attribute(
	store: &dyn GalleryStore,
	tags: &dyn TagSource,
	attribute: Attribute,
	sort_by: SortBy,
	order: SortOrder,
	data_source: Option<DataSourceId>,
) -> StoreResult<Vec<(Option<DataSourceId>, GroupValue)>> {
	match attribute {
		// categories are a fixed enumeration, never scoped by data source
		Attribute::Category => Ok(Category::ALL
			.iter()
			.map(|c| (None, GroupValue::Category(*c)))
			.collect()),
		Attribute::Tags => {
			let names = tags.tag_names_in_use()?;
			Ok(names
				.into_iter()
				.filter(|name| !tags.is_category_tag(name))
				.map(|name| (None, GroupValue::Tag(name)))
				.collect())
		}
		Attribute::Analyzed => Ok(vec![
			(None, GroupValue::Analyzed(false)),
			(None, GroupValue::Analyzed(true)),
		]),
		Attribute::HashSet => {
			// BTreeSet from the store keeps hash sets in name order
			let names = store.hash_set_names()?;
			Ok(names
				.into_iter()
				.map(|name| (None, GroupValue::HashSet(name)))
				.collect())
		}
		Attribute::MimeType => {
			// a type counts only if at least one id carrying it is tracked
			let mut values = Vec::new();
			for (mime, ids) in store.mime_types_in_use()? {
				if ids.iter().any(|id| store.is_tracked(*id)) {
					values.push((None, GroupValue::MimeType(mime)));
				}
			}
			Ok(values)
		}
		Attribute::Path => store.find_values_for_attribute(attribute, sort_by, order, data_source),
	}
}

/// File ids belonging to the group named by the key.
pub fn file_ids_in_group(
	store: &dyn GalleryStore,
	tags: &dyn TagSource,
	key: &GroupKey,
) -> StoreResult<HashSet<FileId>> {
	match &key.value {
		GroupValue::Category(category) => file_ids_with_category(store, tags, *category),
		GroupValue::Tag(tag) => file_ids_with_tag(store, tags, tag),
		GroupValue::MimeType(mime) => file_ids_with_mime_type(store, mime.as_deref()),
		// straight store query for path, hash-set, and analyzed groups
		_ => store.file_ids_in_group(key),
	}
}

/// Membership of a category group. The uncategorized group is "every
/// tracked file not carrying any other category tag".
fn file_ids_with_category(
	store: &dyn GalleryStore,
	tags: &dyn TagSource,
	category: Category,
) -> StoreResult<HashSet<FileId>> {
	if category == Category::Zero {
		let mut categorized = HashSet::new();
		for tag_name in tags.category_tag_names()? {
			if tags.category_for_tag(&tag_name) == Some(Category::Zero) {
				continue;
			}
			for id in tags.files_with_tag(&tag_name)? {
				if store.is_tracked(id) {
					categorized.insert(id);
				}
			}
		}
		debug!(
			"Resolve: uncategorized group excludes {} categorized files",
			categorized.len()
		);
		store.all_file_ids_except(&categorized)
	} else {
		file_ids_with_tag(store, tags, &tags.tag_for_category(category))
	}
}

fn file_ids_with_tag(
	store: &dyn GalleryStore,
	tags: &dyn TagSource,
	tag: &str,
) -> StoreResult<HashSet<FileId>> {
	Ok(tags
		.files_with_tag(tag)?
		.into_iter()
		.filter(|id| store.is_tracked(*id))
		.collect())
}

fn file_ids_with_mime_type(
	store: &dyn GalleryStore,
	mime: Option<&str>,
) -> StoreResult<HashSet<FileId>> {
	let mut out = HashSet::new();
	for (candidate, ids) in store.mime_types_in_use()? {
		if candidate.as_deref() == mime {
			out.extend(ids.into_iter().filter(|id| store.is_tracked(*id)));
		}
	}
	Ok(out)
}
