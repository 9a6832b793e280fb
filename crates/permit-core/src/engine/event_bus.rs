//! Broadcast channel for committed token events.

use permit_types::TokenEvent;
use tokio::sync::broadcast;

/// Fan-out of committed events to any number of subscribers.
///
/// Publishing never fails the call that produced the events: with no
/// subscribers the events are simply dropped, and slow subscribers observe
/// `RecvError::Lagged`.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<TokenEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<TokenEvent> {
		self.sender.subscribe()
	}

	/// Publishes events in order. Returns how many were delivered to at least
	/// one subscriber.
	pub fn publish_all(&self, events: Vec<TokenEvent>) -> usize {
		events
			.into_iter()
			.filter(|event| self.sender.send(event.clone()).is_ok())
			.count()
	}
}
