//! Entity definitions and the subtype chain used for type queries. Each
//! definition pairs a set of lifecycle callbacks with a typed slot for a
//! polymorphic, type-erased payload.

use std::any::Any;
use std::sync::Arc;

use crate::engine::EntityContext;

/// Every lifecycle/event callback is handed its own payload directly (the
/// first argument) plus an [`EntityContext`] anchored at the same entity, so
/// it can reach the rest of the tree. The payload argument is taken out of
/// the arena for the duration of the call (see `Engine::with_payload`), so
/// `ctx` must not be used to re-borrow this same entity's payload — use the
/// direct argument for that.
pub type OnInit = fn(&mut dyn Any, &mut EntityContext<'_>);
pub type OnDeinit = fn(&mut dyn Any, &mut EntityContext<'_>);
pub type OnFrame = fn(&mut dyn Any, &mut EntityContext<'_>, elapsed_ms: f32);

/// Shapes an entity: payload size, lifecycle hooks, and an optional link to
/// a parent definition (the subtype chain). Two definitions are equal iff
/// their payload size and all three callbacks match — the subtype link
/// itself is not part of equality, only of chain-walking.
#[derive(Clone)]
pub struct EntityDefinition {
	pub data_size: usize,
	pub on_init: Option<OnInit>,
	pub on_deinit: Option<OnDeinit>,
	pub on_frame: Option<OnFrame>,
	pub subtype: Option<Arc<EntityDefinition>>,
}

impl EntityDefinition {
	pub fn new<T: 'static>() -> Self {
		Self {
			data_size: std::mem::size_of::<T>(),
			on_init: None,
			on_deinit: None,
			on_frame: None,
			subtype: None,
		}
	}

	pub fn with_on_init(mut self, f: OnInit) -> Self {
		self.on_init = Some(f);
		self
	}

	pub fn with_on_deinit(mut self, f: OnDeinit) -> Self {
		self.on_deinit = Some(f);
		self
	}

	pub fn with_on_frame(mut self, f: OnFrame) -> Self {
		self.on_frame = Some(f);
		self
	}

	pub fn with_subtype(mut self, parent: Arc<EntityDefinition>) -> Self {
		self.subtype = Some(parent);
		self
	}

	/// Walks `self, subtype, subtype.subtype, ...` looking for a definition
	/// equal to `target`.
	pub fn chain_contains(&self, target: &EntityDefinition) -> bool {
		if self == target {
			return true;
		}
		let mut current = self.subtype.clone();
		while let Some(next) = current {
			if *next == *target {
				return true;
			}
			current = next.subtype.clone();
		}
		false
	}
}

impl PartialEq for EntityDefinition {
	fn eq(&self, other: &Self) -> bool {
		self.data_size == other.data_size
			&& self.on_init == other.on_init
			&& self.on_deinit == other.on_deinit
			&& self.on_frame == other.on_frame
	}
}

impl Eq for EntityDefinition {}

#[cfg(test)]
mod tests {
	use super::*;

	struct Payload(u32);

	fn init(_: &mut dyn Any, _: &mut EntityContext<'_>) {}

	#[test]
	fn equality_ignores_subtype_link() {
		let base = Arc::new(EntityDefinition::new::<Payload>().with_on_init(init));
		let derived = EntityDefinition::new::<Payload>()
			.with_on_init(init)
			.with_subtype(base.clone());
		// Same data_size + callbacks => equal, regardless of `subtype`.
		assert_eq!(*base, derived);
	}

	#[test]
	fn chain_contains_walks_subtype_links() {
		let grandparent = Arc::new(EntityDefinition::new::<Payload>());
		let parent = Arc::new(EntityDefinition::new::<Payload>().with_on_init(init).with_subtype(grandparent.clone()));
		let child = Arc::new(
			EntityDefinition::new::<Payload>()
				.with_on_init(init)
				.with_on_frame(|_, _, _| {})
				.with_subtype(parent.clone()),
		);

		assert!(child.chain_contains(&child));
		assert!(child.chain_contains(&parent));
		assert!(child.chain_contains(&grandparent));

		let unrelated = EntityDefinition::new::<Payload>().with_on_frame(|_, _, _| {});
		assert!(!child.chain_contains(&unrelated));
	}
}
