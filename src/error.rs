//! Error types for the grouping engine

use thiserror::Error;

use crate::data::FileId;

/// Failures reported by the external store and tag-source collaborators.
///
/// The engine treats these as non-fatal: a store failure during an event
/// handler or a rebuild step is logged and the operation degrades to an
/// empty/absent result. Handlers never propagate a `StoreError` out across
/// the notification channel boundary.
#[derive(Debug, Error)]
pub enum StoreError {
	/// The store has no file with the requested id
	#[error("no file with id {0}")]
	FileNotFound(FileId),

	/// A query against the backing store failed
	#[error("store query failed: {0}")]
	Query(String),

	/// Underlying I/O failure while talking to the store
	#[error("store I/O error: {0}")]
	Io(#[from] std::io::Error),
}

/// Terminal failures of a full rebuild.
#[derive(Debug, Error)]
pub enum RegroupError {
	/// The task observed its cancellation token. A normal, silent outcome.
	#[error("regroup cancelled")]
	Cancelled,

	/// Store failure while enumerating values or materializing groups
	#[error("regroup store failure: {0}")]
	Store(#[from] StoreError),
}

/// Convenience alias for store/collaborator results.
pub type StoreResult<T> = Result<T, StoreError>;

/// Convenience alias for rebuild outcomes.
pub type RegroupResult<T> = Result<T, RegroupError>;
