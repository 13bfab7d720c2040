//! Headless form state management for Rust
//!
//! This crate provides the state core of a form, the part a UI layer
//! binds to without the crate knowing anything about rendering:
//! - Field registration with default values and per-field validators
//! - Synchronous validation on change, blur, and submit triggers
//! - Debounced asynchronous validation with stale-result supersession
//! - Derived form state (`values`, `can_submit`, `is_submitting`)
//! - Selector-based subscriptions that fire only when the selected
//!   projection changes
//!
//! # Example
//!
//! ```
//! use fieldwork::{FieldConfig, Form, FormState};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let form = Form::new();
//!
//! form.register(
//! 	FieldConfig::new("first_name")
//! 		.with_default(json!(""))
//! 		.validate(|value| {
//! 			let empty = value.as_str().is_none_or(str::is_empty);
//! 			empty.then(|| "A first name is required".to_string())
//! 		})
//! 		.validate_async(Duration::from_millis(500), |value| async move {
//! 			let has_error = value.as_str().is_some_and(|s| s.contains("error"));
//! 			has_error.then(|| "No \"error\" allowed in first name".to_string())
//! 		}),
//! )
//! .unwrap();
//! form.register(FieldConfig::new("last_name").with_default(json!("")))
//! 	.unwrap();
//! form.register(FieldConfig::new("hobbies").with_default(json!([])))
//! 	.unwrap();
//!
//! // A submit button subscribes to exactly the state it renders.
//! form.subscribe(
//! 	|state: &FormState| (state.can_submit, state.is_submitting),
//! 	|(can_submit, is_submitting)| {
//! 		let _ = (can_submit, is_submitting);
//! 	},
//! );
//!
//! form.set_value("first_name", json!("Ann")).unwrap();
//! form.submit(|values| async move {
//! 	println!("{values:?}");
//! })
//! .await
//! .unwrap();
//! # });
//! ```

pub mod field;
pub mod form;
pub mod scheduler;
pub mod state;
pub mod subscription;
pub mod validators;

pub use field::{
	AsyncValidatorFn, AsyncValidatorFuture, FieldConfig, FieldSnapshot, FieldValidator,
	SyncValidatorFn, ValidationTrigger,
};
pub use form::{Form, FormError, FormResult};
pub use scheduler::VALIDATION_FAILED_MESSAGE;
pub use state::FormState;
pub use subscription::SubscriptionId;
pub use validators::{
	MaxLengthValidator, MinLengthValidator, PatternValidator, RequiredValidator,
};
