//! Notification channel for dataset change events

use async_channel as channel;
use std::sync::{Arc, Mutex};
use tracing::error;

use crate::data::FileId;

/// Fine-grained dataset change events the grouping engine reconciles with
/// its current group set.
#[derive(Debug, Clone)]
pub enum GalleryEvent {
	/// A tag was added to a file
	TagAdded { file_id: FileId, tag: String },
	/// A tag was removed from a file
	TagDeleted { file_id: FileId, tag: String },
	/// Files were inserted or updated in the store
	FilesUpdated(Vec<FileId>),
	/// Files were removed from the dataset
	FilesRemoved(Vec<FileId>),
}

/// Simple broadcast-style event bus using fan-out to per-subscriber channels.
#[derive(Default)]
pub struct EventBus {
	subscribers: Mutex<Vec<channel::Sender<GalleryEvent>>>,
}

impl EventBus {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			subscribers: Mutex::new(Vec::new()),
		})
	}

	/// Subscribe to events. Returns a Receiver that will get future events.
	pub fn subscribe(self: &Arc<Self>) -> channel::Receiver<GalleryEvent> {
		let (tx, rx) = channel::unbounded();
		match self.subscribers.lock() {
			Ok(mut subs) => subs.push(tx),
			Err(_) => error!("EventBus: subscribers lock poisoned; subscriber not registered"),
		}
		rx
	}

	/// Broadcast an event to all subscribers. Best-effort, drops if a channel is full/closed.
	pub fn emit(&self, event: GalleryEvent) {
		if let Ok(subs) = self.subscribers.lock() {
			for sub in subs.iter() {
				let _ = sub.try_send(event.clone());
			}
		} else {
			error!("EventBus: subscribers lock poisoned; dropping event");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_fan_out_to_all_subscribers() {
		let bus = EventBus::new();
		let rx1 = bus.subscribe();
		let rx2 = bus.subscribe();

		bus.emit(GalleryEvent::FilesRemoved(vec![FileId(1)]));

		for rx in [rx1, rx2] {
			match rx.try_recv() {
				Ok(GalleryEvent::FilesRemoved(ids)) => assert_eq!(ids, vec![FileId(1)]),
				other => panic!("unexpected event: {other:?}"),
			}
		}
	}

	#[test]
	fn test_emit_with_no_subscribers_is_noop() {
		let bus = EventBus::new();
		bus.emit(GalleryEvent::FilesUpdated(vec![]));
	}
}
