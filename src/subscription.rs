//! Selector-based subscriptions over derived form state
//!
//! Consumers subscribe with a pure selector projecting [`FormState`]
//! down to the part they care about; the callback fires only when that
//! projection changes by value. Callbacks run in registration order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::state::FormState;

/// Handle identifying one subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type NotifyFn = Arc<dyn Fn(&FormState) + Send + Sync>;

struct SubscriberInfo {
	id: u64,
	notify: NotifyFn,
}

/// Registry of live subscriptions.
pub(crate) struct SubscriberSet {
	subscribers: RwLock<Vec<SubscriberInfo>>,
	next_id: AtomicU64,
}

impl SubscriberSet {
	pub(crate) fn new() -> Self {
		Self {
			subscribers: RwLock::new(Vec::new()),
			next_id: AtomicU64::new(1),
		}
	}

	/// Register a selector/callback pair.
	///
	/// The selector runs on every form-state recomputation; the callback
	/// is invoked only when the projected value differs from the previous
	/// projection for this subscription. The first recomputation after
	/// subscribing always notifies, since there is no previous projection
	/// to compare against.
	pub(crate) fn subscribe<S, P, C>(&self, selector: S, callback: C) -> SubscriptionId
	where
		S: Fn(&FormState) -> P + Send + Sync + 'static,
		P: PartialEq + Send + 'static,
		C: Fn(&P) + Send + Sync + 'static,
	{
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let last_projection: Mutex<Option<P>> = Mutex::new(None);

		let notify: NotifyFn = Arc::new(move |state| {
			let projected = selector(state);
			let mut last = last_projection.lock();
			if last.as_ref() != Some(&projected) {
				callback(&projected);
				*last = Some(projected);
			}
		});

		self.subscribers.write().push(SubscriberInfo { id, notify });
		SubscriptionId(id)
	}

	/// Remove a subscription. Returns whether it was still registered;
	/// removing twice is a no-op.
	pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut subscribers = self.subscribers.write();
		let original_len = subscribers.len();
		subscribers.retain(|s| s.id != id.0);
		subscribers.len() < original_len
	}

	/// Run every subscriber against a freshly derived form state.
	///
	/// Subscribers are cloned out of the lock before invocation so a
	/// callback may subscribe or unsubscribe without deadlocking.
	pub(crate) fn notify(&self, state: &FormState) {
		let subscribers: Vec<NotifyFn> = self
			.subscribers
			.read()
			.iter()
			.map(|s| Arc::clone(&s.notify))
			.collect();

		for notify in subscribers {
			notify(state);
		}
	}

	pub(crate) fn count(&self) -> usize {
		self.subscribers.read().len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;

	fn state(can_submit: bool, is_submitting: bool) -> FormState {
		FormState {
			values: Default::default(),
			can_submit,
			is_submitting,
		}
	}

	#[test]
	fn test_notifies_only_on_projection_change() {
		let set = SubscriberSet::new();
		let calls = Arc::new(AtomicUsize::new(0));

		let calls_clone = Arc::clone(&calls);
		set.subscribe(
			|state: &FormState| state.can_submit,
			move |_| {
				calls_clone.fetch_add(1, Ordering::SeqCst);
			},
		);

		set.notify(&state(true, false));
		set.notify(&state(true, false));
		set.notify(&state(true, true));
		assert_eq!(calls.load(Ordering::SeqCst), 1);

		set.notify(&state(false, false));
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn test_unsubscribe_is_idempotent() {
		let set = SubscriberSet::new();
		let id = set.subscribe(|state: &FormState| state.can_submit, |_| {});

		assert_eq!(set.count(), 1);
		assert!(set.unsubscribe(id));
		assert!(!set.unsubscribe(id));
		assert_eq!(set.count(), 0);
	}

	#[test]
	fn test_callbacks_run_in_registration_order() {
		let set = SubscriberSet::new();
		let order = Arc::new(Mutex::new(Vec::new()));

		for label in ["first", "second", "third"] {
			let order = Arc::clone(&order);
			set.subscribe(
				|state: &FormState| state.can_submit,
				move |_| order.lock().push(label),
			);
		}

		set.notify(&state(true, false));
		assert_eq!(*order.lock(), vec!["first", "second", "third"]);
	}

	#[test]
	fn test_unsubscribe_from_inside_callback_does_not_deadlock() {
		let set = Arc::new(SubscriberSet::new());
		let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

		let set_clone = Arc::clone(&set);
		let slot_clone = Arc::clone(&slot);
		let id = set.subscribe(
			|state: &FormState| state.can_submit,
			move |_| {
				if let Some(id) = slot_clone.lock().take() {
					set_clone.unsubscribe(id);
				}
			},
		);
		*slot.lock() = Some(id);

		set.notify(&state(true, false));
		assert_eq!(set.count(), 0);
	}
}
