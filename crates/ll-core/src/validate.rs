//! Input checks shared by the engines. Every failure is a `Validation` error whose
//! message is fit to show the user as-is.

use crate::error::{AppError, Result};

pub const MAX_REVIEW_CHARS: usize = 1000;

/// Trimmed, non-empty text.
pub fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Finite, non-negative money amount.
pub fn amount(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::validation(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(value)
}

pub fn rating(value: i64) -> Result<u8> {
    match u8::try_from(value) {
        Ok(stars @ 1..=5) => Ok(stars),
        _ => Err(AppError::validation("rating must be between 1 and 5")),
    }
}

/// Optional review text; blank counts as absent.
pub fn review(value: Option<String>) -> Result<Option<String>> {
    let Some(text) = value else {
        return Ok(None);
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    if text.chars().count() > MAX_REVIEW_CHARS {
        return Err(AppError::validation(format!(
            "review must be at most {MAX_REVIEW_CHARS} characters"
        )));
    }
    Ok(Some(text.to_string()))
}

/// Lower-cased address with something on both sides of one `@`.
pub fn email(value: &str) -> Result<String> {
    let email = value.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(AppError::validation("a valid email address is required")),
    }
}
