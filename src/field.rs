//! Field configuration and per-field validation rules

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

/// When a validator runs relative to user interaction.
///
/// `Submit` validators run only on the submit path; `Change` and `Blur`
/// validators additionally re-run there, since submission validates the
/// whole form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationTrigger {
	/// Run whenever the field value changes
	Change,
	/// Run when the field loses focus
	Blur,
	/// Run only when the form is submitted
	Submit,
}

/// Synchronous validator: returns an error message, or `None` when the
/// value is acceptable.
pub type SyncValidatorFn = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Boxed future produced by an asynchronous validator.
pub type AsyncValidatorFuture = Pin<Box<dyn Future<Output = Option<String>> + Send>>;

/// Asynchronous validator: takes the value by ownership (the validation
/// task outlives the triggering call) and resolves to an error message,
/// or `None` when the value is acceptable.
pub type AsyncValidatorFn = Arc<dyn Fn(Value) -> AsyncValidatorFuture + Send + Sync>;

/// A synchronous validation rule attached to a field.
#[derive(Clone)]
pub(crate) struct SyncRule {
	pub(crate) trigger: ValidationTrigger,
	pub(crate) run: SyncValidatorFn,
}

/// An asynchronous validation rule attached to a field.
///
/// `debounce` delays the validator after its trigger fires; only the
/// last trigger within the window leads to an invocation.
#[derive(Clone)]
pub(crate) struct AsyncRule {
	pub(crate) trigger: ValidationTrigger,
	pub(crate) debounce: Duration,
	pub(crate) run: AsyncValidatorFn,
}

/// Reusable validation logic that can be attached to a field.
///
/// Implemented by the built-in validators in [`crate::validators`];
/// custom validators implement it to participate in the same pipeline.
pub trait FieldValidator: Send + Sync {
	/// Returns an error message, or `None` when the value is acceptable.
	fn validate(&self, value: &Value) -> Option<String>;
}

/// Declarative description of a form field: its name, default value,
/// and validation rules, in registration order.
///
/// # Examples
///
/// ```
/// use fieldwork::{FieldConfig, ValidationTrigger};
/// use serde_json::json;
/// use std::time::Duration;
///
/// let field = FieldConfig::new("first_name")
/// 	.with_default(json!(""))
/// 	.validate(|value| {
/// 		let empty = value.as_str().is_none_or(str::is_empty);
/// 		empty.then(|| "A first name is required".to_string())
/// 	})
/// 	.validate_async(Duration::from_millis(500), |value| async move {
/// 		let has_error = value.as_str().is_some_and(|s| s.contains("error"));
/// 		has_error.then(|| "No \"error\" allowed in first name".to_string())
/// 	});
///
/// assert_eq!(field.name(), "first_name");
/// ```
pub struct FieldConfig {
	pub(crate) name: String,
	pub(crate) default: Value,
	pub(crate) sync_rules: Vec<SyncRule>,
	pub(crate) async_rules: Vec<AsyncRule>,
}

impl FieldConfig {
	/// Create a field configuration with the given name and a `null`
	/// default value.
	///
	/// # Examples
	///
	/// ```
	/// use fieldwork::FieldConfig;
	///
	/// let field = FieldConfig::new("last_name");
	/// assert_eq!(field.name(), "last_name");
	/// ```
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			default: Value::Null,
			sync_rules: vec![],
			async_rules: vec![],
		}
	}

	/// Set the default value the field starts from (and returns to on
	/// reset).
	///
	/// # Examples
	///
	/// ```
	/// use fieldwork::FieldConfig;
	/// use serde_json::json;
	///
	/// let field = FieldConfig::new("hobbies").with_default(json!([]));
	/// ```
	pub fn with_default(mut self, default: impl Into<Value>) -> Self {
		self.default = default.into();
		self
	}

	/// Attach a synchronous validator that runs on every value change.
	pub fn validate<F>(self, validator: F) -> Self
	where
		F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
	{
		self.validate_on(ValidationTrigger::Change, validator)
	}

	/// Attach a synchronous validator with an explicit trigger.
	pub fn validate_on<F>(mut self, trigger: ValidationTrigger, validator: F) -> Self
	where
		F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
	{
		self.sync_rules.push(SyncRule {
			trigger,
			run: Arc::new(validator),
		});
		self
	}

	/// Attach a reusable [`FieldValidator`], running on every value
	/// change.
	///
	/// # Examples
	///
	/// ```
	/// use fieldwork::FieldConfig;
	/// use fieldwork::validators::RequiredValidator;
	///
	/// let field = FieldConfig::new("email")
	/// 	.validate_with(RequiredValidator::new());
	/// ```
	pub fn validate_with<V>(self, validator: V) -> Self
	where
		V: FieldValidator + 'static,
	{
		self.validate(move |value| validator.validate(value))
	}

	/// Attach a debounced asynchronous validator that runs on every
	/// value change.
	///
	/// A zero debounce runs the validator immediately on trigger.
	pub fn validate_async<F, Fut>(self, debounce: Duration, validator: F) -> Self
	where
		F: Fn(Value) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Option<String>> + Send + 'static,
	{
		self.validate_async_on(ValidationTrigger::Change, debounce, validator)
	}

	/// Attach a debounced asynchronous validator with an explicit
	/// trigger.
	pub fn validate_async_on<F, Fut>(
		mut self,
		trigger: ValidationTrigger,
		debounce: Duration,
		validator: F,
	) -> Self
	where
		F: Fn(Value) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Option<String>> + Send + 'static,
	{
		self.async_rules.push(AsyncRule {
			trigger,
			debounce,
			run: Arc::new(move |value| Box::pin(validator(value))),
		});
		self
	}

	/// The field name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The configured default value.
	pub fn default_value(&self) -> &Value {
		&self.default
	}
}

impl fmt::Debug for FieldConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FieldConfig")
			.field("name", &self.name)
			.field("default", &self.default)
			.field("sync_rules", &self.sync_rules.len())
			.field("async_rules", &self.async_rules.len())
			.finish()
	}
}

/// Immutable snapshot of one field's state.
///
/// Returned by [`crate::Form::get_state`]; holds no reference into the
/// registry, so it stays valid across later mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
	/// Field name, unique within the form
	pub name: String,
	/// Current value
	pub value: Value,
	/// Current validation error shown to the user, if any
	pub error: Option<String>,
	/// Whether an asynchronous validator is currently running
	pub is_validating: bool,
	/// Whether the field has been interacted with
	pub is_touched: bool,
	/// Whether the value differs from the field's default
	pub is_dirty: bool,
}

/// Registry-owned state of a single field.
pub(crate) struct FieldState {
	pub(crate) name: String,
	pub(crate) value: Value,
	pub(crate) default: Value,
	pub(crate) sync_rules: Vec<SyncRule>,
	pub(crate) async_rules: Vec<AsyncRule>,
	pub(crate) error: Option<String>,
	/// Generation that produced the current `Some` error, used to keep a
	/// newer rule of the same cycle from clobbering an earlier verdict
	/// and to let a current-cycle pass clear a stale error.
	pub(crate) error_generation: Option<u64>,
	pub(crate) is_touched: bool,
	pub(crate) is_dirty: bool,
	/// Monotonic validation-cycle counter; results carrying an older
	/// generation are discarded at apply time.
	pub(crate) generation: u64,
	/// Async validations past their debounce window and not yet applied.
	pub(crate) pending_async: usize,
	/// Armed debounce/validation tasks for the current generation.
	pub(crate) tasks: Vec<JoinHandle<()>>,
}

impl FieldState {
	pub(crate) fn new(config: FieldConfig) -> Self {
		Self {
			name: config.name,
			value: config.default.clone(),
			default: config.default,
			sync_rules: config.sync_rules,
			async_rules: config.async_rules,
			error: None,
			error_generation: None,
			is_touched: false,
			is_dirty: false,
			generation: 0,
			pending_async: 0,
			tasks: vec![],
		}
	}

	pub(crate) fn is_validating(&self) -> bool {
		self.pending_async > 0
	}

	pub(crate) fn snapshot(&self) -> FieldSnapshot {
		FieldSnapshot {
			name: self.name.clone(),
			value: self.value.clone(),
			error: self.error.clone(),
			is_validating: self.is_validating(),
			is_touched: self.is_touched,
			is_dirty: self.is_dirty,
		}
	}
}

impl Drop for FieldState {
	fn drop(&mut self) {
		for task in self.tasks.drain(..) {
			task.abort();
		}
	}
}
