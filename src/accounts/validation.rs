//! Field validation for request payloads.
//!
//! Violations are reported per field using the rule names `required`, `min`,
//! `max` and `email`. Only the first violation of a field is kept.

use crate::error::ValidationErrors;

/// A payload that can check its own fields.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Accumulates rule violations for one payload.
#[derive(Debug, Default)]
pub struct Checker {
    errors: ValidationErrors,
}

impl Checker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-empty value.
    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            self.errors.add(field, "required");
        }
        self
    }

    /// Non-empty value of `min..=max` characters.
    pub fn text(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let length = value.chars().count();
        if value.is_empty() {
            self.errors.add(field, "required");
        } else if length < min {
            self.errors.add(field, "min");
        } else if length > max {
            self.errors.add(field, "max");
        }
        self
    }

    /// Non-empty value shaped like an email address.
    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            self.errors.add(field, "required");
        } else if !is_email(value) {
            self.errors.add(field, "email");
        }
        self
    }

    /// Non-empty list of `min..=max` entries, each of `item_min..=item_max`
    /// characters. Entry violations are keyed `field[index]`.
    pub fn list(
        &mut self,
        field: &str,
        values: &[String],
        (min, max): (usize, usize),
        (item_min, item_max): (usize, usize),
    ) -> &mut Self {
        if values.is_empty() {
            self.errors.add(field, "required");
        } else if values.len() < min {
            self.errors.add(field, "min");
        } else if values.len() > max {
            self.errors.add(field, "max");
        } else {
            for (index, value) in values.iter().enumerate() {
                let length = value.chars().count();
                if length < item_min {
                    self.errors.add(format!("{field}[{index}]"), "min");
                } else if length > item_max {
                    self.errors.add(format!("{field}[{index}]"), "max");
                }
            }
        }
        self
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        self.errors.into_result()
    }
}

/// Loose email shape check: `local@domain.tld` without whitespace.
pub fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}
