//! The engine and its one-frame scheduler. Owns every other subsystem and
//! drives the per-frame control flow: drain commands, drain events,
//! rebuild the active-entity list if dirty, step every entity, pace to the
//! target frame rate.

use std::any::Any;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hearth_util::debug::error::ErrorFormatExt;

use crate::command::{Command, CommandQueue};
use crate::definition::EntityDefinition;
use crate::entity::{mint_unique_name, post_order_with_self, resolve_path, EntityArena, EntityHandle, EntitySlot};
use crate::event::EventStack;
use crate::identifier::{Identifier, Path};
use crate::resource::{BuildMode, ResourceManager, DEFAULT_RESOURCE_ROOT};
use crate::subscription::{EventBroker, EventCallback, Subscription};
use crate::HearthError;

const ROOT_NAME: &str = "root";

#[derive(Clone)]
pub struct EngineConfig {
	pub resource_root: PathBuf,
	pub resource_mode: BuildMode,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			resource_root: PathBuf::from(DEFAULT_RESOURCE_ROOT),
			resource_mode: BuildMode::default(),
		}
	}
}

pub struct Engine {
	arena: EntityArena,
	root: EntityHandle,
	commands: CommandQueue,
	events: EventStack,
	broker: EventBroker,
	resources: ResourceManager,
	active_entities: Vec<EntityHandle>,
	dirty: bool,
	quit_requested: bool,
}

impl Engine {
	pub fn new() -> Self {
		Self::with_config(EngineConfig::default())
	}

	pub fn with_config(config: EngineConfig) -> Self {
		let mut arena = EntityArena::default();
		let root = arena.insert(|_| EntitySlot {
			generation: 0,
			name: Identifier::new(ROOT_NAME).unwrap(),
			parent: None,
			children: Default::default(),
			definition: Arc::new(EntityDefinition::new::<()>()),
			payload: Box::new(()),
		});

		Self {
			arena,
			root,
			commands: CommandQueue::default(),
			events: EventStack::default(),
			broker: EventBroker::default(),
			resources: ResourceManager::new(config.resource_root, config.resource_mode),
			active_entities: vec![root],
			dirty: false,
			quit_requested: false,
		}
	}

	/// Explicit shutdown marker; real teardown happens in `Drop` regardless
	/// of whether the caller bothers to call this first.
	pub fn destroy(self) {}

	pub fn root(&self) -> EntityHandle {
		self.root
	}

	pub fn entity(&mut self, handle: EntityHandle) -> EntityContext<'_> {
		EntityContext { engine: self, handle }
	}

	pub fn root_entity(&mut self) -> EntityContext<'_> {
		let root = self.root;
		self.entity(root)
	}

	pub fn is_alive(&self, handle: EntityHandle) -> bool {
		self.arena.contains(handle)
	}

	/// Development mode: appends the bytes of `source_file_path` into the
	/// archive `archive_name`, keyed by the hash of `source_file_path`.
	/// Release mode: only verifies presence.
	pub fn declare_resource(&mut self, archive_name: &str, source_file_path: &str) -> Result<bool, HearthError> {
		let bytes = std::fs::read(source_file_path).map_err(|source| HearthError::IoFailure {
			path: source_file_path.to_string(),
			source,
		})?;
		self.resources.declare(archive_name, source_file_path, &bytes)
	}

	/// Runs one iteration of the frame control flow, without pacing or
	/// signal handling. `run` builds on top of this; tests call it directly
	/// to drive scenarios deterministically.
	pub fn step(&mut self, elapsed_ms: f32) {
		self.drain_commands();
		self.drain_events();
		if self.dirty {
			self.rebuild_active_entities();
			self.dirty = false;
		}
		for handle in self.active_entities.clone() {
			self.step_frame(handle, elapsed_ms);
		}
	}

	pub fn should_quit(&self) -> bool {
		self.quit_requested
	}

	/// Enters the frame loop, pacing to `fps` and terminating on a SIGINT or
	/// on any entity calling `quit()`. A second SIGINT aborts the process
	/// immediately, from the signal handler itself, which runs no user code.
	pub fn run(&mut self, fps: u32) {
		let sigint_count = Arc::new(AtomicU32::new(0));
		let handler_flag = sigint_count.clone();
		if let Err(err) = ctrlc::set_handler(move || {
			let previous = handler_flag.fetch_add(1, Ordering::SeqCst);
			if previous + 1 >= 2 {
				std::process::abort();
			}
		}) {
			log::debug!("SIGINT handler not installed: {err}");
		}

		let frame_budget = Duration::from_millis(1000 / u64::from(fps.max(1)));
		let mut last_tick = Instant::now();

		log::info!("engine starting at {fps} fps");

		loop {
			let now = Instant::now();
			let elapsed_ms = now.duration_since(last_tick).as_secs_f32() * 1000.0;
			last_tick = now;

			self.step(elapsed_ms);

			if self.quit_requested || sigint_count.load(Ordering::SeqCst) >= 1 {
				log::info!("engine shutting down");
				break;
			}

			let spent = now.elapsed();
			if spent < frame_budget {
				thread::sleep(frame_budget - spent);
			}
		}
	}

	// === Internal frame steps === //

	fn drain_commands(&mut self) {
		let to_process = self.commands.len();
		for _ in 0..to_process {
			if let Some(command) = self.commands.pop() {
				self.apply_command(command);
			}
		}
	}

	fn apply_command(&mut self, command: Command) {
		match command {
			Command::RemoveEntity { target, .. } => {
				if target == self.root {
					HearthError::RemoveRoot.log();
					return;
				}
				if self.arena.contains(target) {
					self.annihilate(target);
				}
			}
			Command::SubscribeToEvent { event_name, subscription, .. } => {
				self.broker.subscribe(event_name, subscription);
			}
		}
	}

	fn drain_events(&mut self) {
		while let Some(stacked) = self.events.pop() {
			let subscriptions: Vec<Subscription> = match self.broker.list_for(&stacked.event.name) {
				Some(list) => list.iter().copied().collect(),
				None => continue,
			};
			for subscription in subscriptions {
				let payload = &stacked.event.payload;
				self.with_payload(subscription.subscriber, |entity_payload, ctx| {
					(subscription.callback)(entity_payload, ctx, payload);
				});
			}
		}
	}

	fn rebuild_active_entities(&mut self) {
		self.active_entities.clear();
		let root = self.root;
		self.collect_pre_order(root);
	}

	fn collect_pre_order(&mut self, node: EntityHandle) {
		self.active_entities.push(node);
		let children: Vec<EntityHandle> = match self.arena.get(node) {
			Some(slot) => slot.children.values().copied().collect(),
			None => return,
		};
		for child in children {
			self.collect_pre_order(child);
		}
	}

	fn step_frame(&mut self, handle: EntityHandle, elapsed_ms: f32) {
		let on_frame = match self.arena.get(handle) {
			Some(slot) => slot.definition.on_frame,
			None => return,
		};
		if let Some(on_frame) = on_frame {
			self.with_payload(handle, |payload, ctx| on_frame(payload, ctx, elapsed_ms));
		}
	}

	/// Temporarily takes `handle`'s payload out of the arena and hands it to
	/// `f` alongside an [`EntityContext`] anchored at the same entity, so a
	/// lifecycle or event callback can reach the rest of the tree without
	/// aliasing its own payload storage. The payload is restored afterward,
	/// unless `f` removed the entity (in which case there is nothing to
	/// restore it to).
	fn with_payload(&mut self, handle: EntityHandle, f: impl FnOnce(&mut dyn Any, &mut EntityContext<'_>)) {
		let Some(slot) = self.arena.get_mut(handle) else { return };
		let mut payload = std::mem::replace(&mut slot.payload, Box::new(()));

		let mut ctx = EntityContext { engine: self, handle };
		f(payload.as_mut(), &mut ctx);

		if let Some(slot) = self.arena.get_mut(handle) {
			slot.payload = payload;
		}
	}

	/// Annihilates `target` and every descendant, deepest-first: `on_deinit`,
	/// resource withdrawal, event/command purge, unsubscription, detach,
	/// free — in that order, per node.
	fn annihilate(&mut self, target: EntityHandle) {
		let order = post_order_with_self(&self.arena, target);
		for handle in order {
			let (definition, parent, name) = match self.arena.get(handle) {
				Some(slot) => (slot.definition.clone(), slot.parent, slot.name.clone()),
				None => continue,
			};

			if let Some(on_deinit) = definition.on_deinit {
				self.with_payload(handle, |payload, ctx| on_deinit(payload, ctx));
			}

			self.resources.withdraw_supplicant_everywhere(handle);
			self.events.remove_events_of(handle);
			self.commands.remove_commands_of(handle);
			self.broker.unsubscribe_all(handle);

			if let Some(parent) = parent {
				if let Some(parent_slot) = self.arena.get_mut(parent) {
					parent_slot.children.remove(&name);
				}
			}

			self.arena.remove(handle);
			log::debug!("annihilated entity {name}");
		}
		self.dirty = true;
	}

	// === Tree operations shared by Engine and EntityContext === //

	fn add_child<T: 'static>(
		&mut self,
		parent: EntityHandle,
		name: &str,
		definition: Arc<EntityDefinition>,
		payload: T,
	) -> Option<EntityHandle> {
		if !self.arena.contains(parent) {
			return None;
		}

		let requested_name = match Identifier::new(name) {
			Some(name) => name,
			None => {
				HearthError::InvalidArgument("entity name must be non-empty and contain no '/'").log();
				return None;
			}
		};

		let unique_name = {
			let parent_slot = self.arena.get(parent)?;
			mint_unique_name(&parent_slot.children, requested_name)
		};

		let child_definition = definition.clone();
		let handle = self.arena.insert(|_| EntitySlot {
			generation: 0,
			name: unique_name.clone(),
			parent: Some(parent),
			children: Default::default(),
			definition: child_definition,
			payload: Box::new(payload),
		});

		if let Some(parent_slot) = self.arena.get_mut(parent) {
			parent_slot.children.insert(unique_name, handle);
		}

		if let Some(on_init) = definition.on_init {
			self.with_payload(handle, |payload, ctx| on_init(payload, ctx));
		}

		self.dirty = true;
		Some(handle)
	}

	fn queue_remove(&mut self, source: Option<EntityHandle>, target: EntityHandle) {
		if target == self.root {
			HearthError::RemoveRoot.log();
			return;
		}
		self.commands.push(Command::RemoveEntity { source, target });
	}

	fn queue_subscribe(&mut self, subscriber: EntityHandle, event_name: &str, priority: i32, callback: EventCallback) {
		let event_name = match Identifier::new(event_name) {
			Some(name) => name,
			None => {
				HearthError::InvalidArgument("event name must be non-empty and contain no '/'").log();
				return;
			}
		};
		self.commands.push(Command::SubscribeToEvent {
			source: Some(subscriber),
			event_name,
			subscription: Subscription { priority, subscriber, callback },
		});
	}

	fn stack_event(&mut self, source: EntityHandle, name: &str, detached: bool, payload: Vec<u8>) {
		let name = match Identifier::new(name) {
			Some(name) => name,
			None => {
				HearthError::InvalidArgument("event name must be non-empty and contain no '/'").log();
				return;
			}
		};
		let source = if detached { None } else { Some(source) };
		self.events.push(source, name, payload);
	}

	fn get_parent(&self, from: EntityHandle, name: Option<&str>, def: Option<&Arc<EntityDefinition>>) -> Option<EntityHandle> {
		let mut current = self.arena.get(from)?.parent;
		while let Some(candidate) = current {
			let slot = self.arena.get(candidate)?;
			let name_matches = name.map_or(true, |n| slot.name.as_str() == n);
			let def_matches = def.map_or(true, |d| slot.definition.chain_contains(d));
			if name_matches && def_matches {
				return Some(candidate);
			}
			current = slot.parent;
		}
		None
	}

	fn get_child(&self, from: EntityHandle, path: &Path, def: Option<&Arc<EntityDefinition>>) -> Option<EntityHandle> {
		let target = resolve_path(&self.arena, from, path)?;
		match def {
			Some(def) => {
				let slot = self.arena.get(target)?;
				slot.definition.chain_contains(def).then_some(target)
			}
			None => Some(target),
		}
	}

	fn is(&self, handle: EntityHandle, def: &Arc<EntityDefinition>) -> bool {
		self.arena
			.get(handle)
			.map_or(false, |slot| slot.definition.chain_contains(def))
	}

	fn children_of(&self, handle: EntityHandle) -> Vec<Identifier> {
		self.arena
			.get(handle)
			.map(|slot| slot.children.keys().cloned().collect())
			.unwrap_or_default()
	}
}

impl Default for Engine {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for Engine {
	fn drop(&mut self) {
		let root = self.root;
		if self.arena.contains(root) {
			self.annihilate(root);
		}
	}
}

/// A borrowed view of one entity plus the engine that owns it — a
/// non-owning reference back to the owning engine, and the reference-
/// passing entity API (`add_child`, `queue_remove`, `graft`,
/// `queue_subscribe`, `stack_event`, `get_parent`, `get_child`, `is`,
/// `fetch_resource`, `quit`). The same type is handed to lifecycle and
/// event callbacks as their context argument.
pub struct EntityContext<'a> {
	engine: &'a mut Engine,
	handle: EntityHandle,
}

impl<'a> EntityContext<'a> {
	pub fn handle(&self) -> EntityHandle {
		self.handle
	}

	/// Reads another entity's payload. During this entity's own lifecycle
	/// or event callback its payload is reached through that callback's
	/// direct argument, not through this method — the slot is temporarily
	/// empty for the duration of the call.
	pub fn payload<T: 'static>(&self) -> Option<&T> {
		self.engine.arena.get(self.handle)?.payload.downcast_ref::<T>()
	}

	pub fn payload_mut<T: 'static>(&mut self) -> Option<&mut T> {
		self.engine.arena.get_mut(self.handle)?.payload.downcast_mut::<T>()
	}

	pub fn add_child<T: 'static>(&mut self, name: &str, definition: Arc<EntityDefinition>, payload: T) -> Option<EntityHandle> {
		self.engine.add_child(self.handle, name, definition, payload)
	}

	pub fn queue_remove(&mut self) {
		let (source, target) = (Some(self.handle), self.handle);
		self.engine.queue_remove(source, target);
	}

	pub fn queue_subscribe(&mut self, event_name: &str, priority: i32, callback: EventCallback) {
		self.engine.queue_subscribe(self.handle, event_name, priority, callback);
	}

	pub fn stack_event(&mut self, name: &str, detached: bool, payload: Vec<u8>) {
		self.engine.stack_event(self.handle, name, detached, payload);
	}

	pub fn get_parent(&self, name: Option<&str>, def: Option<&Arc<EntityDefinition>>) -> Option<EntityHandle> {
		self.engine.get_parent(self.handle, name, def)
	}

	pub fn get_child(&self, path: &str, def: Option<&Arc<EntityDefinition>>) -> Option<EntityHandle> {
		self.engine.get_child(self.handle, &Path::parse(path), def)
	}

	pub fn is(&self, def: &Arc<EntityDefinition>) -> bool {
		self.engine.is(self.handle, def)
	}

	pub fn children(&self) -> Vec<Identifier> {
		self.engine.children_of(self.handle)
	}

	pub fn fetch_resource(&mut self, archive_name: &str, resource_path: &str) -> Option<(Vec<u8>, usize)> {
		self.engine.resources.fetch(self.handle, archive_name, resource_path)
	}

	/// Runs a user-supplied procedure anchored at this entity, typically to
	/// add a subtree in one shot.
	pub fn graft(&mut self, procedure: impl FnOnce(&mut EntityContext<'_>)) {
		procedure(self);
	}

	pub fn quit(&mut self) {
		self.engine.quit_requested = true;
	}
}
