use std::fmt::{Display, Formatter};

use clinora_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// A validated domain event type name, e.g. `appointment.created`.
///
/// Event types are dot-separated lowercase segments. The set of event types
/// is open: publishers introduce new names without registry changes, so the
/// validation here only enforces shape, not membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventType(String);

impl EventType {
    /// Creates a validated event type name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "event type must not be empty".to_owned(),
            ));
        }

        let valid_shape = trimmed.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        });

        if !valid_shape {
            return Err(AppError::Validation(format!(
                "event type '{trimmed}' must be dot-separated lowercase segments"
            )));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the event type name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for EventType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}
