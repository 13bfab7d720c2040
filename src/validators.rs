//! Reusable field validators
//!
//! Each validator carries an optional custom message and plugs into the
//! field validation pipeline through [`FieldValidator`], so it can be
//! attached with [`crate::FieldConfig::validate_with`].

use regex::Regex;
use serde_json::Value;

use crate::field::FieldValidator;

/// Number of user-perceived units in a value, for length validation.
///
/// Strings are measured in characters (not bytes, so multi-byte input
/// is counted correctly); arrays in elements.
fn value_length(value: &Value) -> Option<usize> {
	match value {
		Value::String(s) => Some(s.chars().count()),
		Value::Array(items) => Some(items.len()),
		_ => None,
	}
}

/// Validates that a value is present: not `null`, not an empty or
/// whitespace-only string, not an empty array.
///
/// # Examples
///
/// ```
/// use fieldwork::FieldValidator;
/// use fieldwork::validators::RequiredValidator;
/// use serde_json::json;
///
/// let validator = RequiredValidator::new();
/// assert!(validator.validate(&json!("Ann")).is_none());
/// assert!(validator.validate(&json!("")).is_some());
/// assert!(validator.validate(&json!("   ")).is_some());
/// assert!(validator.validate(&json!(null)).is_some());
/// assert!(validator.validate(&json!([])).is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequiredValidator {
	message: Option<String>,
}

impl RequiredValidator {
	pub fn new() -> Self {
		Self { message: None }
	}

	/// Set a custom error message returned on validation failure.
	///
	/// # Examples
	///
	/// ```
	/// use fieldwork::FieldValidator;
	/// use fieldwork::validators::RequiredValidator;
	/// use serde_json::json;
	///
	/// let validator = RequiredValidator::new().with_message("A first name is required");
	/// assert_eq!(
	/// 	validator.validate(&json!("")).as_deref(),
	/// 	Some("A first name is required"),
	/// );
	/// ```
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}
}

impl FieldValidator for RequiredValidator {
	fn validate(&self, value: &Value) -> Option<String> {
		let missing = match value {
			Value::Null => true,
			Value::String(s) => s.trim().is_empty(),
			Value::Array(items) => items.is_empty(),
			_ => false,
		};
		missing.then(|| {
			self.message
				.clone()
				.unwrap_or_else(|| "This field is required".to_string())
		})
	}
}

/// Validates that a string or array value has at least `min` units.
///
/// Values without a length (numbers, booleans, objects, `null`) pass;
/// combine with [`RequiredValidator`] to reject them.
///
/// # Examples
///
/// ```
/// use fieldwork::FieldValidator;
/// use fieldwork::validators::MinLengthValidator;
/// use serde_json::json;
///
/// let validator = MinLengthValidator::new(3);
/// assert!(validator.validate(&json!("abc")).is_none());
/// assert!(validator.validate(&json!("ab")).is_some());
/// ```
#[derive(Debug, Clone)]
pub struct MinLengthValidator {
	min: usize,
	message: Option<String>,
}

impl MinLengthValidator {
	pub fn new(min: usize) -> Self {
		Self { min, message: None }
	}

	/// Set a custom error message returned on validation failure.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}
}

impl FieldValidator for MinLengthValidator {
	fn validate(&self, value: &Value) -> Option<String> {
		let length = value_length(value)?;
		(length < self.min).then(|| {
			self.message.clone().unwrap_or_else(|| {
				format!(
					"Ensure this value has at least {} characters (it has {})",
					self.min, length
				)
			})
		})
	}
}

/// Validates that a string or array value has at most `max` units.
///
/// # Examples
///
/// ```
/// use fieldwork::FieldValidator;
/// use fieldwork::validators::MaxLengthValidator;
/// use serde_json::json;
///
/// let validator = MaxLengthValidator::new(5);
/// assert!(validator.validate(&json!("12345")).is_none());
/// assert!(validator.validate(&json!("123456")).is_some());
/// ```
#[derive(Debug, Clone)]
pub struct MaxLengthValidator {
	max: usize,
	message: Option<String>,
}

impl MaxLengthValidator {
	pub fn new(max: usize) -> Self {
		Self { max, message: None }
	}

	/// Set a custom error message returned on validation failure.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}
}

impl FieldValidator for MaxLengthValidator {
	fn validate(&self, value: &Value) -> Option<String> {
		let length = value_length(value)?;
		(length > self.max).then(|| {
			self.message.clone().unwrap_or_else(|| {
				format!(
					"Ensure this value has at most {} characters (it has {})",
					self.max, length
				)
			})
		})
	}
}

/// Validates that a string value matches a regular expression.
///
/// Non-string values fail validation.
///
/// # Examples
///
/// ```
/// use fieldwork::FieldValidator;
/// use fieldwork::validators::PatternValidator;
/// use serde_json::json;
///
/// let validator = PatternValidator::new("^[A-Z]{3}$").unwrap();
/// assert!(validator.validate(&json!("ABC")).is_none());
/// assert!(validator.validate(&json!("abc")).is_some());
/// ```
#[derive(Debug, Clone)]
pub struct PatternValidator {
	pattern: Regex,
	message: Option<String>,
}

impl PatternValidator {
	/// Compile the pattern; fails on an invalid regular expression.
	pub fn new(pattern: &str) -> Result<Self, regex::Error> {
		Ok(Self {
			pattern: Regex::new(pattern)?,
			message: None,
		})
	}

	/// Set a custom error message returned on validation failure.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}
}

impl FieldValidator for PatternValidator {
	fn validate(&self, value: &Value) -> Option<String> {
		let matched = value.as_str().is_some_and(|s| self.pattern.is_match(s));
		(!matched).then(|| {
			self.message
				.clone()
				.unwrap_or_else(|| "Enter a valid value".to_string())
		})
	}
}
