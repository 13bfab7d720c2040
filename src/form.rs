//! Form facade: field registry, submission, and state publication

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::field::{FieldConfig, FieldSnapshot, FieldState, ValidationTrigger};
use crate::scheduler;
use crate::state::FormState;
use crate::subscription::{SubscriberSet, SubscriptionId};

/// Errors surfaced by form operations.
///
/// Validator-level faults never appear here: they are captured into the
/// owning field's error state and isolated from the rest of the form.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
	#[error("field '{0}' is already registered")]
	DuplicateField(String),
	#[error("no field named '{0}' is registered")]
	UnknownField(String),
	#[error("submit blocked: {reason}")]
	SubmitBlocked { reason: String },
}

pub type FormResult<T> = Result<T, FormError>;

/// Shared form internals: the field table, the subscriber registry, and
/// submission bookkeeping. All field mutation is serialized behind the
/// one `RwLock`; validation tasks re-acquire it to apply their results.
pub(crate) struct FormInner {
	/// Fields in registration order
	pub(crate) fields: RwLock<Vec<FieldState>>,
	pub(crate) subscribers: SubscriberSet,
	pub(crate) is_submitting: AtomicBool,
	pub(crate) submit_attempts: AtomicU64,
}

impl FormInner {
	/// Derive the current form state and notify subscribers.
	///
	/// Callers must not hold the field lock: the state is snapshotted
	/// first, then callbacks run against the immutable snapshot.
	pub(crate) fn publish(&self) {
		let state = self.derive_state();
		self.subscribers.notify(&state);
	}

	pub(crate) fn derive_state(&self) -> FormState {
		let snapshots: Vec<FieldSnapshot> =
			self.fields.read().iter().map(FieldState::snapshot).collect();
		FormState::derive(&snapshots, self.is_submitting.load(Ordering::SeqCst))
	}
}

/// A headless form: named fields, validation, derived submit state, and
/// change subscriptions. Cloning is cheap and shares the same form.
///
/// The form renders nothing; a UI layer binds input events to
/// [`set_value`](Form::set_value)/[`blur`](Form::blur) and subscribes to
/// the derived state for its submit control and per-field indicators.
///
/// # Examples
///
/// ```
/// use fieldwork::{FieldConfig, Form};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let form = Form::new();
/// form.register(
/// 	FieldConfig::new("first_name")
/// 		.with_default(json!(""))
/// 		.validate(|value| {
/// 			let empty = value.as_str().is_none_or(str::is_empty);
/// 			empty.then(|| "A first name is required".to_string())
/// 		}),
/// )
/// .unwrap();
///
/// form.set_value("first_name", json!("")).unwrap();
/// let state = form.get_state("first_name").unwrap();
/// assert_eq!(state.error.as_deref(), Some("A first name is required"));
/// assert!(!form.form_state().can_submit);
///
/// form.set_value("first_name", json!("Ann")).unwrap();
/// assert!(form.form_state().can_submit);
/// # });
/// ```
pub struct Form {
	inner: Arc<FormInner>,
}

impl Form {
	/// Create an empty form.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(FormInner {
				fields: RwLock::new(Vec::new()),
				subscribers: SubscriberSet::new(),
				is_submitting: AtomicBool::new(false),
				submit_attempts: AtomicU64::new(0),
			}),
		}
	}

	/// Register a field. Fails when the name is already taken.
	///
	/// # Examples
	///
	/// ```
	/// use fieldwork::{FieldConfig, Form, FormError};
	///
	/// let form = Form::new();
	/// form.register(FieldConfig::new("email")).unwrap();
	/// assert!(matches!(
	/// 	form.register(FieldConfig::new("email")),
	/// 	Err(FormError::DuplicateField(_))
	/// ));
	/// ```
	pub fn register(&self, config: FieldConfig) -> FormResult<()> {
		{
			let mut fields = self.inner.fields.write();
			if fields.iter().any(|f| f.name == config.name) {
				return Err(FormError::DuplicateField(config.name));
			}
			debug!(field = %config.name, "registering field");
			fields.push(FieldState::new(config));
		}
		self.inner.publish();
		Ok(())
	}

	/// Remove a field, discarding its state and superseding any pending
	/// validation. Returns whether the field was registered; removing an
	/// unknown name is a no-op.
	pub fn unregister(&self, name: &str) -> bool {
		let removed = {
			let mut fields = self.inner.fields.write();
			let original_len = fields.len();
			// FieldState::drop aborts the armed validation tasks.
			fields.retain(|f| f.name != name);
			fields.len() < original_len
		};
		if removed {
			debug!(field = %name, "unregistered field");
			self.inner.publish();
		}
		removed
	}

	/// Set a field's value, marking it dirty and touched, and run its
	/// change-triggered validators.
	///
	/// Synchronous validators run inline; asynchronous ones are armed
	/// behind their debounce on the current tokio runtime. A new value
	/// supersedes any validation still in flight for the field.
	pub fn set_value(&self, name: &str, value: impl Into<Value>) -> FormResult<()> {
		let value = value.into();
		{
			let inner = Arc::clone(&self.inner);
			let mut fields = self.inner.fields.write();
			let field = fields
				.iter_mut()
				.find(|f| f.name == name)
				.ok_or_else(|| FormError::UnknownField(name.to_string()))?;

			field.is_dirty = value != field.default;
			field.is_touched = true;
			field.value = value;

			scheduler::begin_cycle(field);
			// The previous verdict was about the previous value; a change
			// pass starts from a clean slate even when no change rule is
			// attached (blur and submit errors clear on edit).
			field.error = None;
			field.error_generation = None;
			let errored = scheduler::run_sync_pass(field, ValidationTrigger::Change);
			if !errored {
				scheduler::schedule_async_pass(&inner, field, ValidationTrigger::Change);
			}
		}
		self.inner.publish();
		Ok(())
	}

	/// Mark a field as touched and run its blur-triggered validators.
	pub fn blur(&self, name: &str) -> FormResult<()> {
		{
			let inner = Arc::clone(&self.inner);
			let mut fields = self.inner.fields.write();
			let field = fields
				.iter_mut()
				.find(|f| f.name == name)
				.ok_or_else(|| FormError::UnknownField(name.to_string()))?;

			field.is_touched = true;

			scheduler::begin_cycle(field);
			let errored = scheduler::run_sync_pass(field, ValidationTrigger::Blur);
			if !errored {
				scheduler::schedule_async_pass(&inner, field, ValidationTrigger::Blur);
			}
		}
		self.inner.publish();
		Ok(())
	}

	/// Immutable snapshot of one field, or `None` for an unknown name.
	pub fn get_state(&self, name: &str) -> Option<FieldSnapshot> {
		self.inner
			.fields
			.read()
			.iter()
			.find(|f| f.name == name)
			.map(FieldState::snapshot)
	}

	/// The derived form-level state.
	pub fn form_state(&self) -> FormState {
		self.inner.derive_state()
	}

	/// Current value of every field, keyed by name.
	pub fn values(&self) -> HashMap<String, Value> {
		self.inner
			.fields
			.read()
			.iter()
			.map(|f| (f.name.clone(), f.value.clone()))
			.collect()
	}

	/// Names of the registered fields, in registration order.
	pub fn field_names(&self) -> Vec<String> {
		self.inner.fields.read().iter().map(|f| f.name.clone()).collect()
	}

	pub fn field_count(&self) -> usize {
		self.inner.fields.read().len()
	}

	/// Whether any field's value differs from its default.
	pub fn has_changed(&self) -> bool {
		self.inner.fields.read().iter().any(|f| f.is_dirty)
	}

	/// Number of times submission has been attempted, blocked or not.
	pub fn submit_attempts(&self) -> u64 {
		self.inner.submit_attempts.load(Ordering::SeqCst)
	}

	/// Restore every field to its default value, clearing errors and
	/// touched/dirty flags. In-flight validations are superseded.
	pub fn reset(&self) {
		{
			let mut fields = self.inner.fields.write();
			for field in fields.iter_mut() {
				scheduler::begin_cycle(field);
				field.value = field.default.clone();
				field.error = None;
				field.error_generation = None;
				field.is_touched = false;
				field.is_dirty = false;
			}
		}
		self.inner.publish();
	}

	/// Subscribe to a projection of the derived form state.
	///
	/// The selector must be pure; the callback fires only when the
	/// projected value changes, in subscriber registration order.
	///
	/// # Examples
	///
	/// ```
	/// use fieldwork::{FieldConfig, Form, FormState};
	/// use serde_json::json;
	/// use std::sync::Arc;
	/// use std::sync::atomic::{AtomicBool, Ordering};
	///
	/// # tokio_test::block_on(async {
	/// let form = Form::new();
	/// form.register(FieldConfig::new("name").with_default(json!("")))
	/// 	.unwrap();
	///
	/// let submittable = Arc::new(AtomicBool::new(false));
	/// let submittable_clone = Arc::clone(&submittable);
	/// form.subscribe(
	/// 	|state: &FormState| (state.can_submit, state.is_submitting),
	/// 	move |(can_submit, _)| {
	/// 		submittable_clone.store(*can_submit, Ordering::SeqCst);
	/// 	},
	/// );
	///
	/// form.set_value("name", json!("Ann")).unwrap();
	/// assert!(submittable.load(Ordering::SeqCst));
	/// # });
	/// ```
	pub fn subscribe<S, P, C>(&self, selector: S, callback: C) -> SubscriptionId
	where
		S: Fn(&FormState) -> P + Send + Sync + 'static,
		P: PartialEq + Send + 'static,
		C: Fn(&P) + Send + Sync + 'static,
	{
		self.inner.subscribers.subscribe(selector, callback)
	}

	/// Remove a subscription; removing twice is a no-op.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		self.inner.subscribers.unsubscribe(id)
	}

	/// Validate the whole form and hand the values to `handler`.
	///
	/// Submission is blocked, with the handler never invoked, when a
	/// field is already in error, a validation is still in flight, or
	/// another submission is running. Otherwise every field's validators
	/// run to completion (asynchronous ones without debounce); errors
	/// found there block the submission the same way.
	///
	/// # Examples
	///
	/// ```
	/// use fieldwork::{FieldConfig, Form};
	/// use serde_json::json;
	/// use std::sync::Arc;
	/// use parking_lot::Mutex;
	///
	/// # tokio_test::block_on(async {
	/// let form = Form::new();
	/// form.register(FieldConfig::new("first_name").with_default(json!("Ann")))
	/// 	.unwrap();
	///
	/// let submitted = Arc::new(Mutex::new(None));
	/// let submitted_clone = Arc::clone(&submitted);
	/// form.submit(move |values| async move {
	/// 	*submitted_clone.lock() = Some(values);
	/// })
	/// .await
	/// .unwrap();
	///
	/// let values = submitted.lock().take().unwrap();
	/// assert_eq!(values["first_name"], json!("Ann"));
	/// # });
	/// ```
	pub async fn submit<H, Fut>(&self, handler: H) -> FormResult<()>
	where
		H: FnOnce(HashMap<String, Value>) -> Fut,
		Fut: Future<Output = ()>,
	{
		self.inner.submit_attempts.fetch_add(1, Ordering::SeqCst);

		if self
			.inner
			.is_submitting
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.is_err()
		{
			return Err(FormError::SubmitBlocked {
				reason: "a submission is already in flight".to_string(),
			});
		}

		if let Err(e) = self.check_submittable() {
			self.inner.is_submitting.store(false, Ordering::SeqCst);
			return Err(e);
		}
		self.inner.publish();

		match self.run_submit_validation().await {
			Ok(values) => {
				handler(values.clone()).await;
				self.inner.is_submitting.store(false, Ordering::SeqCst);
				self.inner.publish();
				debug!(fields = values.len(), "form submitted");
				Ok(())
			}
			Err(e) => {
				self.inner.is_submitting.store(false, Ordering::SeqCst);
				self.inner.publish();
				debug!("submit blocked by validation");
				Err(e)
			}
		}
	}

	fn check_submittable(&self) -> FormResult<()> {
		let fields = self.inner.fields.read();
		for field in fields.iter() {
			if field.is_validating() {
				return Err(FormError::SubmitBlocked {
					reason: format!("field '{}' is still validating", field.name),
				});
			}
			if let Some(error) = &field.error {
				return Err(FormError::SubmitBlocked {
					reason: format!("field '{}' is invalid: {}", field.name, error),
				});
			}
		}
		Ok(())
	}

	/// Run every field's validators for the submit trigger. Sync rules
	/// run under the lock; async rules run here, undebounced, and their
	/// results are applied under the generation captured at the start,
	/// so a concurrent edit supersedes them like any other cycle.
	async fn run_submit_validation(&self) -> FormResult<HashMap<String, Value>> {
		let mut pending = Vec::new();
		{
			let mut fields = self.inner.fields.write();
			for field in fields.iter_mut() {
				scheduler::begin_cycle(field);
				let errored = scheduler::run_sync_pass(field, ValidationTrigger::Submit);
				if !errored && !field.async_rules.is_empty() {
					pending.push((
						field.name.clone(),
						field.value.clone(),
						field.async_rules.clone(),
						field.generation,
					));
				}
			}
		}
		self.inner.publish();

		for (name, value, rules, generation) in pending {
			for rule in &rules {
				let outcome = scheduler::run_async_rule(rule, &name, value.clone()).await;
				let mut fields = self.inner.fields.write();
				if let Some(field) = fields.iter_mut().find(|f| f.name == name) {
					if field.generation == generation {
						scheduler::apply_async_outcome(field, outcome, generation);
					}
				}
			}
		}
		self.inner.publish();

		let fields = self.inner.fields.read();
		if let Some(field) = fields.iter().find(|f| f.error.is_some()) {
			return Err(FormError::SubmitBlocked {
				reason: format!(
					"field '{}' is invalid: {}",
					field.name,
					field.error.as_deref().unwrap_or_default()
				),
			});
		}
		Ok(fields
			.iter()
			.map(|f| (f.name.clone(), f.value.clone()))
			.collect())
	}
}

impl Default for Form {
	fn default() -> Self {
		Self::new()
	}
}

impl Clone for Form {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl std::fmt::Debug for Form {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Form")
			.field("field_count", &self.field_count())
			.field("subscriber_count", &self.inner.subscribers.count())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn required(message: &'static str) -> impl Fn(&Value) -> Option<String> + Send + Sync {
		move |value| {
			let empty = value.as_str().is_none_or(str::is_empty);
			empty.then(|| message.to_string())
		}
	}

	#[test]
	fn test_register_and_duplicate() {
		let form = Form::new();
		form.register(FieldConfig::new("first_name")).unwrap();

		let err = form.register(FieldConfig::new("first_name")).unwrap_err();
		assert!(matches!(err, FormError::DuplicateField(name) if name == "first_name"));
		assert_eq!(form.field_count(), 1);
	}

	#[test]
	fn test_unregister_is_idempotent() {
		let form = Form::new();
		form.register(FieldConfig::new("first_name")).unwrap();

		assert!(form.unregister("first_name"));
		assert!(!form.unregister("first_name"));
		assert_eq!(form.field_count(), 0);
	}

	#[test]
	fn test_set_value_on_unknown_field() {
		let form = Form::new();
		let err = form.set_value("missing", json!("x")).unwrap_err();
		assert!(matches!(err, FormError::UnknownField(name) if name == "missing"));
	}

	#[test]
	fn test_required_field_round_trip() {
		let form = Form::new();
		form.register(
			FieldConfig::new("first_name")
				.with_default(json!(""))
				.validate(required("A first name is required")),
		)
		.unwrap();

		form.set_value("first_name", json!("")).unwrap();
		let state = form.get_state("first_name").unwrap();
		assert_eq!(state.error.as_deref(), Some("A first name is required"));
		assert!(!state.is_validating);
		assert!(!form.form_state().can_submit);

		form.set_value("first_name", json!("Ann")).unwrap();
		let state = form.get_state("first_name").unwrap();
		assert_eq!(state.error, None);
		assert!(form.form_state().can_submit);
	}

	#[test]
	fn test_dirty_and_touched_tracking() {
		let form = Form::new();
		form.register(FieldConfig::new("name").with_default(json!("Ann")))
			.unwrap();

		let state = form.get_state("name").unwrap();
		assert!(!state.is_dirty);
		assert!(!state.is_touched);
		assert!(!form.has_changed());

		form.set_value("name", json!("Bea")).unwrap();
		let state = form.get_state("name").unwrap();
		assert!(state.is_dirty);
		assert!(state.is_touched);
		assert!(form.has_changed());

		// Back to the default value: no longer dirty, still touched.
		form.set_value("name", json!("Ann")).unwrap();
		let state = form.get_state("name").unwrap();
		assert!(!state.is_dirty);
		assert!(state.is_touched);
	}

	#[test]
	fn test_blur_runs_blur_validators() {
		let form = Form::new();
		form.register(
			FieldConfig::new("email")
				.with_default(json!(""))
				.validate_on(ValidationTrigger::Blur, required("Email is required")),
		)
		.unwrap();

		// A change pass must not run the blur rule.
		form.set_value("email", json!("")).unwrap();
		assert_eq!(form.get_state("email").unwrap().error, None);

		form.blur("email").unwrap();
		let state = form.get_state("email").unwrap();
		assert_eq!(state.error.as_deref(), Some("Email is required"));
		assert!(state.is_touched);
	}

	#[test]
	fn test_reset_restores_defaults() {
		let form = Form::new();
		form.register(
			FieldConfig::new("first_name")
				.with_default(json!(""))
				.validate(required("A first name is required")),
		)
		.unwrap();

		form.set_value("first_name", json!("")).unwrap();
		assert!(form.get_state("first_name").unwrap().error.is_some());

		form.reset();
		let state = form.get_state("first_name").unwrap();
		assert_eq!(state.value, json!(""));
		assert_eq!(state.error, None);
		assert!(!state.is_dirty);
		assert!(!state.is_touched);
		assert!(form.form_state().can_submit);
	}

	#[test]
	fn test_values_and_field_names() {
		let form = Form::new();
		form.register(FieldConfig::new("first_name").with_default(json!("Ann")))
			.unwrap();
		form.register(FieldConfig::new("hobbies").with_default(json!(["jazz"])))
			.unwrap();

		assert_eq!(form.field_names(), vec!["first_name", "hobbies"]);
		let values = form.values();
		assert_eq!(values["first_name"], json!("Ann"));
		assert_eq!(values["hobbies"], json!(["jazz"]));
	}

	#[tokio::test]
	async fn test_submit_blocked_by_error() {
		let form = Form::new();
		form.register(
			FieldConfig::new("first_name")
				.with_default(json!(""))
				.validate(required("A first name is required")),
		)
		.unwrap();
		form.set_value("first_name", json!("")).unwrap();

		let handled = Arc::new(AtomicBool::new(false));
		let handled_clone = Arc::clone(&handled);
		let result = form
			.submit(move |_| async move {
				handled_clone.store(true, Ordering::SeqCst);
			})
			.await;

		assert!(matches!(result, Err(FormError::SubmitBlocked { .. })));
		assert!(!handled.load(Ordering::SeqCst));
		assert!(!form.form_state().is_submitting);
		assert_eq!(form.submit_attempts(), 1);
	}

	#[tokio::test]
	async fn test_submit_runs_submit_trigger_validators() {
		let form = Form::new();
		form.register(
			FieldConfig::new("first_name")
				.with_default(json!(""))
				.validate_on(
					ValidationTrigger::Submit,
					required("A first name is required"),
				),
		)
		.unwrap();

		// No error before submission: the rule only runs on submit.
		assert!(form.form_state().can_submit);

		let result = form.submit(|_| async {}).await;
		assert!(matches!(result, Err(FormError::SubmitBlocked { .. })));
		let state = form.get_state("first_name").unwrap();
		assert_eq!(state.error.as_deref(), Some("A first name is required"));
	}

	#[tokio::test]
	async fn test_submit_passes_values_to_handler() {
		let form = Form::new();
		form.register(FieldConfig::new("first_name").with_default(json!("")))
			.unwrap();
		form.register(FieldConfig::new("hobbies").with_default(json!([])))
			.unwrap();
		form.set_value("first_name", json!("Ann")).unwrap();

		let received = Arc::new(parking_lot::Mutex::new(None));
		let received_clone = Arc::clone(&received);
		form.submit(move |values| async move {
			*received_clone.lock() = Some(values);
		})
		.await
		.unwrap();

		let values = received.lock().take().unwrap();
		assert_eq!(values["first_name"], json!("Ann"));
		assert_eq!(values["hobbies"], json!([]));
		assert!(!form.form_state().is_submitting);
	}
}
