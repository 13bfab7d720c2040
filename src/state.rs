//! Derived form-level state
//!
//! The aggregator is a pure derivation over field snapshots: it stores
//! nothing of its own and is recomputed synchronously on every field
//! mutation. Debouncing never happens at this layer.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::field::FieldSnapshot;

/// Form-level state derived from the individual field states.
///
/// `can_submit` is true exactly when no field carries an error and no
/// field has an asynchronous validation in flight.
///
/// # Examples
///
/// ```
/// use fieldwork::FormState;
///
/// let state = FormState::derive(std::iter::empty(), false);
/// assert!(state.can_submit);
/// assert!(!state.is_submitting);
/// assert!(state.values.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormState {
	/// Current value of every registered field, keyed by field name
	pub values: HashMap<String, Value>,
	/// Whether submission is currently allowed
	pub can_submit: bool,
	/// Whether a submission handler is currently running
	pub is_submitting: bool,
}

impl FormState {
	/// Derive the form state from a set of field snapshots.
	///
	/// # Examples
	///
	/// ```
	/// use fieldwork::{FieldSnapshot, FormState};
	/// use serde_json::json;
	///
	/// let field = FieldSnapshot {
	/// 	name: "first_name".to_string(),
	/// 	value: json!("Ann"),
	/// 	error: None,
	/// 	is_validating: false,
	/// 	is_touched: true,
	/// 	is_dirty: true,
	/// };
	///
	/// let state = FormState::derive([&field], false);
	/// assert!(state.can_submit);
	/// assert_eq!(state.values["first_name"], json!("Ann"));
	/// ```
	pub fn derive<'a>(
		fields: impl IntoIterator<Item = &'a FieldSnapshot>,
		is_submitting: bool,
	) -> Self {
		let mut values = HashMap::new();
		let mut can_submit = true;

		for field in fields {
			if field.error.is_some() || field.is_validating {
				can_submit = false;
			}
			values.insert(field.name.clone(), field.value.clone());
		}

		Self {
			values,
			can_submit,
			is_submitting,
		}
	}
}
