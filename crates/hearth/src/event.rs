//! Value-typed events and the LIFO stack that holds them. An event owns a
//! copy of its name and payload bytes and is attached to a source entity
//! (or the root, when pushed `detached`).

use crate::entity::EntityHandle;
use crate::identifier::Identifier;

#[derive(Debug, Clone)]
pub struct Event {
	pub name: Identifier,
	pub payload: Vec<u8>,
}

/// An event plus the entity it is attached to — `None` means the root
/// (either because the event originated there, or because it was pushed
/// `detached`, binding it to the root so it survives removal of the
/// entity that raised it).
pub(crate) struct StackedEvent {
	pub source: Option<EntityHandle>,
	pub event: Event,
}

/// LIFO stack of pending events. `pop` yields the most recently pushed
/// event; the frame loop drains it to empty every frame, and any callback
/// invoked while draining may push more events, which are drained in the
/// same pass.
#[derive(Default)]
pub struct EventStack {
	stack: Vec<StackedEvent>,
}

impl EventStack {
	pub fn push(&mut self, source: Option<EntityHandle>, name: Identifier, payload: Vec<u8>) {
		self.stack.push(StackedEvent { source, event: Event { name, payload } });
	}

	/// Re-pushes a batch of upstream events, preserving FIFO semantics for
	/// the batch despite the stack being LIFO overall — the first-arrived
	/// event of the batch is popped first.
	pub fn push_batch_reversed(&mut self, source: Option<EntityHandle>, events: Vec<(Identifier, Vec<u8>)>) {
		for (name, payload) in events.into_iter().rev() {
			self.push(source, name, payload);
		}
	}

	pub(crate) fn pop(&mut self) -> Option<StackedEvent> {
		self.stack.pop()
	}

	pub fn is_empty(&self) -> bool {
		self.stack.is_empty()
	}

	pub fn len(&self) -> usize {
		self.stack.len()
	}

	/// Drops every pending event attached to `entity`. Part of annihilating
	/// an entity.
	pub(crate) fn remove_events_of(&mut self, entity: EntityHandle) {
		self.stack.retain(|e| e.source != Some(entity));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn id(s: &str) -> Identifier {
		Identifier::new(s).unwrap()
	}

	#[test]
	fn lifo_pop_order() {
		let mut stack = EventStack::default();
		stack.push(None, id("a"), vec![]);
		stack.push(None, id("b"), vec![]);
		stack.push(None, id("c"), vec![]);

		let names: Vec<_> = std::iter::from_fn(|| stack.pop()).map(|e| e.event.name).collect();
		assert_eq!(names, vec![id("c"), id("b"), id("a")]);
	}

	#[test]
	fn batch_replay_preserves_arrival_order() {
		let mut stack = EventStack::default();
		stack.push_batch_reversed(None, vec![(id("first"), vec![]), (id("second"), vec![])]);

		assert_eq!(stack.pop().unwrap().event.name, id("first"));
		assert_eq!(stack.pop().unwrap().event.name, id("second"));
	}
}
