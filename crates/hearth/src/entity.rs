//! The entity tree. The engine owns every entity in a generational arena
//! so that entity references never alias the arena's backing storage and
//! a removed slot's index can be reused safely.

use std::any::Any;
use std::sync::Arc;

use crate::definition::EntityDefinition;
use crate::identifier::{Identifier, Path};

/// A stable, non-owning reference to an entity: an index into the engine's
/// arena plus a generation counter that invalidates references to a slot
/// once it has been freed and reused. Treat a handle as invalidated once
/// the entity it names has been removed, even if the index gets reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
	pub(crate) index: u32,
	pub(crate) generation: u32,
}

pub(crate) struct EntitySlot {
	pub generation: u32,
	pub name: Identifier,
	pub parent: Option<EntityHandle>,
	/// Iteration order is key order: children are kept in a name-sorted
	/// map rather than an insertion-ordered one.
	pub children: std::collections::BTreeMap<Identifier, EntityHandle>,
	pub definition: Arc<EntityDefinition>,
	pub payload: Box<dyn Any>,
}

/// The arena backing the tree. Indices of removed slots are recycled via
/// `free_list`, with a per-index generation counter (kept alive even while
/// the slot is empty) so stale `EntityHandle`s never alias a reused index.
#[derive(Default)]
pub(crate) struct EntityArena {
	slots: Vec<Option<EntitySlot>>,
	generations: Vec<u32>,
	free_list: Vec<u32>,
}

impl EntityArena {
	pub fn insert(&mut self, build: impl FnOnce(u32) -> EntitySlot) -> EntityHandle {
		let index = match self.free_list.pop() {
			Some(index) => index,
			None => {
				let index = self.slots.len() as u32;
				self.slots.push(None);
				self.generations.push(0);
				index
			}
		};

		let mut slot = build(index);
		let generation = self.generations[index as usize];
		slot.generation = generation;
		self.slots[index as usize] = Some(slot);

		EntityHandle { index, generation }
	}

	pub fn get(&self, handle: EntityHandle) -> Option<&EntitySlot> {
		self.slots
			.get(handle.index as usize)
			.and_then(|slot| slot.as_ref())
			.filter(|slot| slot.generation == handle.generation)
	}

	pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut EntitySlot> {
		self.slots
			.get_mut(handle.index as usize)
			.and_then(|slot| slot.as_mut())
			.filter(|slot| slot.generation == handle.generation)
	}

	pub fn contains(&self, handle: EntityHandle) -> bool {
		self.get(handle).is_some()
	}

	/// Frees a slot, making its index available for reuse under a new
	/// generation. Returns the removed slot so the caller can still finish
	/// running teardown logic (`on_deinit`, unsubscribing, ...) on it.
	pub fn remove(&mut self, handle: EntityHandle) -> Option<EntitySlot> {
		let slot = self.slots.get_mut(handle.index as usize)?;
		if slot.as_ref().map(|s| s.generation) != Some(handle.generation) {
			return None;
		}
		let removed = slot.take();
		self.generations[handle.index as usize] = handle.generation.wrapping_add(1);
		self.free_list.push(handle.index);
		removed
	}
}

/// Walks down from `from` along `path`'s segments, following direct-child
/// links. An empty path resolves to `from` itself.
pub(crate) fn resolve_path(
	arena: &EntityArena,
	from: EntityHandle,
	path: &Path,
) -> Option<EntityHandle> {
	let mut current = from;
	for segment in path.segments() {
		let slot = arena.get(current)?;
		current = *slot.children.get(segment)?;
	}
	Some(current)
}

/// Picks a name for a new child under `parent`, auto-minting past any
/// collision by repeatedly incrementing.
pub(crate) fn mint_unique_name(children: &std::collections::BTreeMap<Identifier, EntityHandle>, mut name: Identifier) -> Identifier {
	while children.contains_key(&name) {
		name = name.increment();
	}
	name
}

/// Collects `target` and every descendant, deepest-first (post-order), so
/// that children are annihilated before their parent.
pub(crate) fn post_order_with_self(arena: &EntityArena, target: EntityHandle) -> Vec<EntityHandle> {
	let mut out = Vec::new();
	fn visit(arena: &EntityArena, node: EntityHandle, out: &mut Vec<EntityHandle>) {
		if let Some(slot) = arena.get(node) {
			for &child in slot.children.values() {
				visit(arena, child, out);
			}
		}
		out.push(node);
	}
	visit(arena, target, &mut out);
	out
}
