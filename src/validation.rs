//! Field-level request validation.
//!
//! Checks accumulate per-field messages and reject the request as a whole
//! with a 422 carrying the full map, so a form can mark every bad field in
//! one round trip.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::response::ApiError;

#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_response(self) -> ApiError {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "The given data was invalid.",
                "errors": self.errors,
            })),
        )
    }

    /// Ok when no check failed, otherwise the 422 response.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.into_response())
        }
    }
}

/// "ticket_id" reads as "ticket id" in messages.
fn label(field: &str) -> String {
    field.replace('_', " ")
}

/// Required non-empty string. Surrounding whitespace is trimmed before the
/// emptiness check, mirroring how the original API normalized form input.
pub fn required_string(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
) -> Option<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            errors.add(field, format!("The {} field is required.", label(field)));
            None
        }
    }
}

pub fn max_length(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(
            field,
            format!(
                "The {} may not be greater than {} characters.",
                label(field),
                max
            ),
        );
    }
}

/// Parse a closed-set value ("low", "open", ...) into its enum, recording the
/// standard invalid-selection message on failure.
pub fn parse_choice<T: std::str::FromStr>(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
) -> Option<T> {
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            errors.add(field, format!("The selected {} is invalid.", label(field)));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::TicketPriority;
    use axum::http::StatusCode;

    #[test]
    fn missing_and_blank_values_fail_required() {
        let mut errors = ValidationErrors::new();
        assert!(required_string(&mut errors, "subject", None).is_none());
        assert!(required_string(&mut errors, "comment", Some("   ")).is_none());
        assert!(!errors.is_empty());
    }

    #[test]
    fn required_trims_surrounding_whitespace() {
        let mut errors = ValidationErrors::new();
        let value = required_string(&mut errors, "subject", Some("  Printer broken  "));
        assert_eq!(value.as_deref(), Some("Printer broken"));
        assert!(errors.is_empty());
    }

    #[test]
    fn max_length_counts_characters_not_bytes() {
        let mut errors = ValidationErrors::new();
        let value = "ä".repeat(255);
        max_length(&mut errors, "subject", &value, 255);
        assert!(errors.is_empty());
        max_length(&mut errors, "subject", &format!("{}x", value), 255);
        assert!(!errors.is_empty());
    }

    #[test]
    fn parse_choice_accepts_set_members_only() {
        let mut errors = ValidationErrors::new();
        let parsed: Option<TicketPriority> = parse_choice(&mut errors, "priority", "urgent");
        assert_eq!(parsed, Some(TicketPriority::Urgent));
        let parsed: Option<TicketPriority> = parse_choice(&mut errors, "priority", "critical");
        assert!(parsed.is_none());
        assert!(!errors.is_empty());
    }

    #[test]
    fn response_carries_field_map_and_422() {
        let mut errors = ValidationErrors::new();
        errors.add("subject", "The subject field is required.");
        errors.add("subject", "The subject may not be greater than 255 characters.");
        errors.add("priority", "The selected priority is invalid.");
        let (status, Json(body)) = errors.into_response();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "The given data was invalid.");
        assert_eq!(body["errors"]["subject"].as_array().unwrap().len(), 2);
        assert_eq!(
            body["errors"]["priority"][0],
            "The selected priority is invalid."
        );
    }
}
