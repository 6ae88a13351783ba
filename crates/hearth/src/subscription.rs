//! Subscriptions, the priority-ordered list for one event name, and the
//! broker mapping event names to those lists.

use std::any::Any;

use hearth_util::mem::hash::FxHashMap;

use crate::engine::EntityContext;
use crate::entity::EntityHandle;
use crate::identifier::Identifier;

/// Invoked with `(subscriber's payload, subscriber's context, event payload
/// bytes)`.
pub type EventCallback = fn(&mut dyn Any, &mut EntityContext<'_>, &[u8]);

/// `{priority, subscriber, callback}`. Ordered by `priority` ascending —
/// lower fires earlier. Equality over all three fields is what identifies
/// a single subscription entry for a targeted `unsubscribe`.
#[derive(Clone, Copy, PartialEq)]
pub struct Subscription {
	pub priority: i32,
	pub subscriber: EntityHandle,
	pub callback: EventCallback,
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("priority", &self.priority)
			.field("subscriber", &self.subscriber)
			.finish_non_exhaustive()
	}
}

/// Subscriptions registered against a single event name, kept sorted by
/// ascending priority; equal priorities preserve subscription order because
/// insertion uses a stable position search.
#[derive(Default)]
pub struct SubscriptionList {
	entries: Vec<Subscription>,
}

impl SubscriptionList {
	pub fn append(&mut self, subscription: Subscription) {
		let position = self
			.entries
			.iter()
			.position(|existing| existing.priority > subscription.priority)
			.unwrap_or(self.entries.len());
		self.entries.insert(position, subscription);
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
		self.entries.iter()
	}

	/// Drops every subscription belonging to `subscriber`. Returns the
	/// number of entries removed.
	fn retain_not_subscriber(&mut self, subscriber: EntityHandle) -> usize {
		let before = self.entries.len();
		self.entries.retain(|s| s.subscriber != subscriber);
		before - self.entries.len()
	}

	/// Drops the single entry equal to `subscription`, if present. Returns
	/// whether an entry was removed.
	fn remove(&mut self, subscription: &Subscription) -> bool {
		match self.entries.iter().position(|existing| existing == subscription) {
			Some(index) => {
				self.entries.remove(index);
				true
			}
			None => false,
		}
	}
}

/// Maps event names to their subscription lists.
#[derive(Default)]
pub struct EventBroker {
	lists: FxHashMap<Identifier, SubscriptionList>,
}

impl EventBroker {
	pub fn subscribe(&mut self, event_name: Identifier, subscription: Subscription) {
		self.lists.entry(event_name).or_default().append(subscription);
	}

	pub fn list_for(&self, event_name: &Identifier) -> Option<&SubscriptionList> {
		self.lists.get(event_name)
	}

	/// Removes every subscription belonging to `subscriber` across all
	/// event names, then drops any list left empty.
	pub fn unsubscribe_all(&mut self, subscriber: EntityHandle) {
		self.lists.retain(|_, list| {
			list.retain_not_subscriber(subscriber);
			!list.is_empty()
		});
	}

	/// Removes the single subscription identified by `(subscriber, event_name,
	/// subscription)` — matched on `subscriber`, `priority`, and `callback` —
	/// leaving every other entry under `event_name` untouched. Drops the list
	/// if this was its last entry. Returns whether a matching entry existed.
	pub fn unsubscribe(&mut self, event_name: &Identifier, subscription: &Subscription) -> bool {
		let Some(list) = self.lists.get_mut(event_name) else {
			return false;
		};
		let removed = list.remove(subscription);
		if list.is_empty() {
			self.lists.remove(event_name);
		}
		removed
	}

	pub fn event_names(&self) -> impl Iterator<Item = &Identifier> {
		self.lists.keys()
	}
}
