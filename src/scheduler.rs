//! Validation scheduling: synchronous passes, debounced asynchronous
//! cycles, and generation-based supersession
//!
//! Every trigger event (value change, blur, submit) starts a fresh
//! validation cycle by bumping the field's generation counter. Results
//! produced under an older generation are discarded at apply time, so a
//! slow validator can never overwrite the outcome of a newer cycle.
//! "Cancel" here means "ignore the late result": armed debounce timers
//! are aborted as an optimization, but the generation check remains the
//! authority.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{trace, warn};

use crate::field::{AsyncRule, FieldState, ValidationTrigger};
use crate::form::FormInner;

/// Error message recorded on a field whose validator panicked.
///
/// The fault is captured and isolated to the field; nothing propagates
/// to the rest of the form.
pub const VALIDATION_FAILED_MESSAGE: &str = "validation failed";

fn rule_matches(rule_trigger: ValidationTrigger, event: ValidationTrigger) -> bool {
	// Submission validates the whole form, so every rule participates.
	rule_trigger == event || event == ValidationTrigger::Submit
}

/// Start a new validation cycle: supersede any in-flight validation for
/// this field and abort its armed timers.
pub(crate) fn begin_cycle(field: &mut FieldState) {
	field.generation = field.generation.wrapping_add(1);
	field.pending_async = 0;
	for task in field.tasks.drain(..) {
		task.abort();
	}
}

/// Run the field's synchronous validators matching `event`, in
/// registration order, stopping at the first error.
///
/// When at least one rule ran, the field's error is overwritten with the
/// pass outcome (an error message or cleared). When no rule matched, the
/// error is left untouched so an unrelated trigger does not erase it.
/// Returns whether the pass produced an error.
pub(crate) fn run_sync_pass(field: &mut FieldState, event: ValidationTrigger) -> bool {
	let rules: Vec<_> = field
		.sync_rules
		.iter()
		.filter(|r| rule_matches(r.trigger, event))
		.cloned()
		.collect();
	if rules.is_empty() {
		return false;
	}

	let mut outcome = None;
	for rule in rules {
		let value = &field.value;
		match std::panic::catch_unwind(AssertUnwindSafe(|| (rule.run)(value))) {
			Ok(None) => {}
			Ok(Some(message)) => {
				outcome = Some(message);
				break;
			}
			Err(_) => {
				warn!(field = %field.name, "sync validator panicked");
				outcome = Some(VALIDATION_FAILED_MESSAGE.to_string());
				break;
			}
		}
	}

	let errored = outcome.is_some();
	field.error_generation = errored.then_some(field.generation);
	field.error = outcome;
	errored
}

/// Arm the field's asynchronous validators matching `event`.
///
/// Each matching rule gets its own task carrying the current generation:
/// it sleeps through the debounce window, re-checks that it is still the
/// authoritative cycle, runs the validator, and applies the result only
/// if still current. The caller must have called [`begin_cycle`] first.
pub(crate) fn schedule_async_pass(
	inner: &Arc<FormInner>,
	field: &mut FieldState,
	event: ValidationTrigger,
) {
	let rules: Vec<AsyncRule> = field
		.async_rules
		.iter()
		.filter(|r| rule_matches(r.trigger, event))
		.cloned()
		.collect();

	for rule in rules {
		trace!(field = %field.name, generation = field.generation, "arming async validator");
		let task = tokio::spawn(debounce_and_validate(
			Arc::clone(inner),
			field.name.clone(),
			field.value.clone(),
			rule,
			field.generation,
		));
		field.tasks.push(task);
	}
}

/// Run one async rule against a field value without debounce, for the
/// submit path. Returns the rule's outcome, with panics captured.
pub(crate) async fn run_async_rule(rule: &AsyncRule, name: &str, value: Value) -> Option<String> {
	match AssertUnwindSafe((rule.run)(value)).catch_unwind().await {
		Ok(outcome) => outcome,
		Err(_) => {
			warn!(field = %name, "async validator panicked");
			Some(VALIDATION_FAILED_MESSAGE.to_string())
		}
	}
}

async fn debounce_and_validate(
	inner: Arc<FormInner>,
	name: String,
	value: Value,
	rule: AsyncRule,
	generation: u64,
) {
	if !rule.debounce.is_zero() {
		tokio::time::sleep(rule.debounce).await;
	}

	// Debouncing -> Validating, unless a newer cycle superseded us while
	// the timer was armed.
	{
		let mut fields = inner.fields.write();
		let Some(field) = fields.iter_mut().find(|f| f.name == name) else {
			return;
		};
		if field.generation != generation {
			return;
		}
		field.pending_async += 1;
	}
	inner.publish();

	let outcome = run_async_rule(&rule, &name, value).await;

	let applied = {
		let mut fields = inner.fields.write();
		let Some(field) = fields.iter_mut().find(|f| f.name == name) else {
			// Field unregistered mid-flight: nothing to write to.
			return;
		};
		if field.generation != generation {
			// Superseded: discard silently, the newer cycle owns the state.
			return;
		}
		apply_async_outcome(field, outcome, generation);
		true
	};

	if applied {
		inner.publish();
	}
}

/// Write an async result into a field under its authoritative
/// generation. The first error of a cycle wins; a clean result clears
/// errors left over from older cycles but never a same-cycle error.
pub(crate) fn apply_async_outcome(
	field: &mut FieldState,
	outcome: Option<String>,
	generation: u64,
) {
	field.pending_async = field.pending_async.saturating_sub(1);
	if field.error_generation == Some(generation) {
		return;
	}
	match outcome {
		Some(message) => {
			field.error = Some(message);
			field.error_generation = Some(generation);
		}
		None => {
			field.error = None;
			field.error_generation = None;
		}
	}
}
