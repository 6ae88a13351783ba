//! The deferred-mutation pipe: a FIFO of tagged variants, each carrying
//! the entity that requested it, applied once per frame.

use std::collections::VecDeque;

use crate::entity::EntityHandle;
use crate::identifier::Identifier;
use crate::subscription::Subscription;

#[derive(Debug, Clone)]
pub enum Command {
	RemoveEntity {
		source: Option<EntityHandle>,
		target: EntityHandle,
	},
	SubscribeToEvent {
		source: Option<EntityHandle>,
		event_name: Identifier,
		subscription: Subscription,
	},
}

impl Command {
	pub(crate) fn source(&self) -> Option<EntityHandle> {
		match self {
			Command::RemoveEntity { source, .. } => *source,
			Command::SubscribeToEvent { source, .. } => *source,
		}
	}
}

/// FIFO queue of pending commands.
#[derive(Default)]
pub struct CommandQueue {
	queue: VecDeque<Command>,
}

impl CommandQueue {
	pub fn push(&mut self, command: Command) {
		self.queue.push_back(command);
	}

	pub fn len(&self) -> usize {
		self.queue.len()
	}

	pub fn is_empty(&self) -> bool {
		self.queue.is_empty()
	}

	pub fn pop(&mut self) -> Option<Command> {
		self.queue.pop_front()
	}

	/// Drops every pending command whose source is `entity`. Invoked while
	/// annihilating an entity so in-flight commands cannot resurrect
	/// references to dead memory.
	pub fn remove_commands_of(&mut self, entity: EntityHandle) {
		self.queue.retain(|cmd| cmd.source() != Some(entity));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn handle(index: u32) -> EntityHandle {
		// Tests only need distinct handles to compare; the arena is not
		// involved, so a generation of 0 is fine.
		EntityHandle { index, generation: 0 }
	}

	#[test]
	fn fifo_order_and_length() {
		let mut q = CommandQueue::default();
		assert_eq!(q.len(), 0);
		q.push(Command::RemoveEntity { source: None, target: handle(1) });
		q.push(Command::RemoveEntity { source: None, target: handle(2) });
		assert_eq!(q.len(), 2);
		match q.pop().unwrap() {
			Command::RemoveEntity { target, .. } => assert_eq!(target, handle(1)),
			_ => panic!("wrong variant"),
		}
		match q.pop().unwrap() {
			Command::RemoveEntity { target, .. } => assert_eq!(target, handle(2)),
			_ => panic!("wrong variant"),
		}
	}

	#[test]
	fn remove_commands_of_drops_only_matching_source() {
		let mut q = CommandQueue::default();
		q.push(Command::RemoveEntity { source: Some(handle(1)), target: handle(9) });
		q.push(Command::RemoveEntity { source: Some(handle(2)), target: handle(9) });
		q.remove_commands_of(handle(1));
		assert_eq!(q.len(), 1);
		match q.pop().unwrap() {
			Command::RemoveEntity { source, .. } => assert_eq!(source, Some(handle(2))),
			_ => panic!("wrong variant"),
		}
	}
}
