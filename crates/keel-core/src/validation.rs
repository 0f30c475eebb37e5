//! Validation utilities.

use crate::KeelError;
use validator::{Validate, ValidationErrors};

/// Extension trait for validation.
pub trait ValidateExt: Validate {
    /// Validates the struct and returns a [`KeelError::Validation`] on failure.
    fn validate_request(&self) -> Result<(), KeelError> {
        self.validate().map_err(validation_errors_to_keel_error)
    }
}

impl<T: Validate> ValidateExt for T {}

/// Flattens `validator::ValidationErrors` into a single message.
///
/// Fields are reported in name order so the message is stable.
#[must_use]
pub fn validation_errors_to_keel_error(errors: ValidationErrors) -> KeelError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let message = fields
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                let detail = error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), ToString::to_string);
                format!("{field}: {detail}")
            })
        })
        .collect::<Vec<_>>()
        .join("; ");

    KeelError::Validation(message)
}
