//! Input checks shared by the route handlers.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_WEEKLY_HOURS: f64 = 168.0;
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

pub fn email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(value.trim()) {
        return Err(ValidationError::new(field, "must be a valid email address"));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {MIN_PASSWORD_LENGTH} characters"),
        ));
    }
    Ok(())
}

pub fn non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::new(field, "must be a non-negative number"));
    }
    Ok(())
}

pub fn probability(value: i32) -> Result<(), ValidationError> {
    if !(0..=100).contains(&value) {
        return Err(ValidationError::new("probability", "must be between 0 and 100"));
    }
    Ok(())
}

pub fn weekly_hours(value: f64) -> Result<(), ValidationError> {
    non_negative("weekly_capacity_hours", value)?;
    if value > MAX_WEEKLY_HOURS {
        return Err(ValidationError::new(
            "weekly_capacity_hours",
            format!("must not exceed {MAX_WEEKLY_HOURS} hours"),
        ));
    }
    Ok(())
}

pub fn duration_minutes(value: i64) -> Result<(), ValidationError> {
    if !(0..=MAX_DURATION_MINUTES).contains(&value) {
        return Err(ValidationError::new(
            "duration_minutes",
            format!("must be between 0 and {MAX_DURATION_MINUTES}"),
        ));
    }
    Ok(())
}
