//! Core data types: attributes, group identities, and file records

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a file in the external store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub i64);

impl fmt::Display for FileId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Identifier of a data source (disk image, logical file set, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataSourceId(pub i64);

impl fmt::Display for DataSourceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// The dimension files are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
	/// Parent path of the file
	Path,
	/// Review category assigned to the file
	Category,
	/// User tags, excluding category-semantic tags
	Tags,
	/// Detected MIME type
	MimeType,
	/// Hash-set membership
	HashSet,
	/// Whether the file has been fully analyzed
	Analyzed,
}

impl fmt::Display for Attribute {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Attribute::Path => write!(f, "path"),
			Attribute::Category => write!(f, "category"),
			Attribute::Tags => write!(f, "tags"),
			Attribute::MimeType => write!(f, "mime-type"),
			Attribute::HashSet => write!(f, "hash-set"),
			Attribute::Analyzed => write!(f, "analyzed"),
		}
	}
}

/// Review categories. A fixed enumeration: category groups exist even when
/// empty. `Zero` means uncategorized, and its membership is defined as every
/// tracked file not tagged with any other category.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Category {
	Zero,
	One,
	Two,
	Three,
	Four,
	Five,
}

impl Category {
	/// All categories, in ascending severity order.
	pub const ALL: [Category; 6] = [
		Category::Zero,
		Category::One,
		Category::Two,
		Category::Three,
		Category::Four,
		Category::Five,
	];
}

impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Category::Zero => write!(f, "Uncategorized"),
			Category::One => write!(f, "Category 1"),
			Category::Two => write!(f, "Category 2"),
			Category::Three => write!(f, "Category 3"),
			Category::Four => write!(f, "Category 4"),
			Category::Five => write!(f, "Category 5"),
		}
	}
}

/// One attribute value, i.e. the value shared by every file in a group.
///
/// `MimeType(None)` is the group of files with no detected type.
#[derive(
	Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum GroupValue {
	Path(String),
	Category(Category),
	Tag(String),
	MimeType(Option<String>),
	HashSet(String),
	Analyzed(bool),
}

impl GroupValue {
	/// The attribute this value belongs to.
	pub fn attribute(&self) -> Attribute {
		match self {
			GroupValue::Path(_) => Attribute::Path,
			GroupValue::Category(_) => Attribute::Category,
			GroupValue::Tag(_) => Attribute::Tags,
			GroupValue::MimeType(_) => Attribute::MimeType,
			GroupValue::HashSet(_) => Attribute::HashSet,
			GroupValue::Analyzed(_) => Attribute::Analyzed,
		}
	}
}

impl fmt::Display for GroupValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			GroupValue::Path(p) => write!(f, "{p}"),
			GroupValue::Category(c) => write!(f, "{c}"),
			GroupValue::Tag(t) => write!(f, "{t}"),
			GroupValue::MimeType(Some(m)) => write!(f, "{m}"),
			GroupValue::MimeType(None) => write!(f, "(no type)"),
			GroupValue::HashSet(h) => write!(f, "{h}"),
			GroupValue::Analyzed(a) => write!(f, "{a}"),
		}
	}
}

/// Immutable identity of a group: attribute, value, and optional data-source
/// scope. Two keys with equal fields name the same group. A `None` data
/// source means "all data sources".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
	pub attribute: Attribute,
	pub value: GroupValue,
	pub data_source: Option<DataSourceId>,
}

impl GroupKey {
	pub fn new(attribute: Attribute, value: GroupValue, data_source: Option<DataSourceId>) -> Self {
		Self {
			attribute,
			value,
			data_source,
		}
	}
}

impl fmt::Display for GroupKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} = {}", self.attribute, self.value)?;
		if let Some(ds) = self.data_source {
			write!(f, " (data source {ds})")?;
		}
		Ok(())
	}
}

/// A file as reported by the external store: the raw attribute values from
/// which group membership is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
	pub id: FileId,
	pub data_source: Option<DataSourceId>,
	/// Parent path, the value of the path attribute
	pub parent_path: String,
	pub category: Category,
	/// All tag names on the file, category tags included
	pub tags: Vec<String>,
	pub mime_type: Option<String>,
	pub hash_sets: Vec<String>,
	pub analyzed: bool,
}

impl FileRecord {
	/// Evaluate an attribute's value-extractor against this file, producing
	/// zero or more group values. Tag values are returned unfiltered here;
	/// excluding category-semantic tags is the manager's concern since it
	/// needs the tag source to classify them.
	pub fn values(&self, attribute: Attribute) -> Vec<GroupValue> {
		match attribute {
			Attribute::Path => vec![GroupValue::Path(self.parent_path.clone())],
			Attribute::Category => vec![GroupValue::Category(self.category)],
			Attribute::Tags => self.tags.iter().cloned().map(GroupValue::Tag).collect(),
			Attribute::MimeType => vec![GroupValue::MimeType(self.mime_type.clone())],
			Attribute::HashSet => self
				.hash_sets
				.iter()
				.cloned()
				.map(GroupValue::HashSet)
				.collect(),
			Attribute::Analyzed => vec![GroupValue::Analyzed(self.analyzed)],
		}
	}
}
