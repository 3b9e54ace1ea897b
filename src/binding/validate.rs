//! Constraint checks for string-valued properties.
//!
//! Checks run in a fixed order and stop at the first violation:
//! 1. `notEmpty`
//! 2. `maxLength`
//! 3. `minLength`
//! 4. `pattern`
//!
//! Lengths count characters, not bytes.

use crate::error::{Result, TemplateError};
use element_template_types::{Constraints, PropertyDescriptor, Scalar};
use regex::Regex;

/// Check `value` against the property's constraints.
///
/// Returns the first violated constraint's message. Non-string values and
/// properties without constraints always pass. A pattern that is not a
/// valid regular expression is a template defect and fails with
/// [`TemplateError::Configuration`].
pub fn validate(property: &PropertyDescriptor, value: &Scalar) -> Result<Option<String>> {
    let Some(constraints) = &property.constraints else {
        return Ok(None);
    };
    match value {
        Scalar::Str(text) => check(constraints, text, property.binding.type_name()),
        Scalar::Bool(_) | Scalar::Int(_) => Ok(None),
    }
}

fn check(constraints: &Constraints, text: &str, binding_type: &str) -> Result<Option<String>> {
    let len = text.chars().count();

    if constraints.not_empty && text.trim().is_empty() {
        return Ok(Some("Must not be empty.".to_string()));
    }
    if let Some(max) = constraints.max_length {
        if len > max {
            return Ok(Some(format!("Must have max length {}.", max)));
        }
    }
    if let Some(min) = constraints.min_length {
        if len < min {
            return Ok(Some(format!("Must have min length {}.", min)));
        }
    }
    if let Some(pattern) = &constraints.pattern {
        let regex = Regex::new(pattern.regex()).map_err(|e| {
            TemplateError::configuration(binding_type, format!("invalid pattern: {}", e))
        })?;
        if !regex.is_match(text) {
            let message = pattern
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Must match pattern {}.", pattern.regex()));
            return Ok(Some(message));
        }
    }
    Ok(None)
}
