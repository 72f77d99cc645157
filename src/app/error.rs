use thiserror::Error;

use crate::domain::announcement::ModerationStatus;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("announcement is already {}", from.as_db())]
    InvalidTransition {
        from: ModerationStatus,
        to: ModerationStatus,
    },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Name of the unique constraint `err` violated, if that is what happened.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<String> {
    constraint_violation(err, UNIQUE_VIOLATION)
}

pub(crate) fn foreign_key_violation(err: &sqlx::Error) -> Option<String> {
    constraint_violation(err, FOREIGN_KEY_VIOLATION)
}

fn constraint_violation(err: &sqlx::Error, code: &str) -> Option<String> {
    let db_err = err.as_database_error()?;
    if db_err.code().as_deref() != Some(code) {
        return None;
    }
    Some(db_err.constraint().unwrap_or_default().to_string())
}

/// Trims `value` and checks its length in characters.
pub(crate) fn require_text(
    field: &str,
    value: &str,
    max_chars: usize,
) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("{} cannot be empty", field)));
    }
    if trimmed.chars().count() > max_chars {
        return Err(ServiceError::validation(format!(
            "{} must be at most {} characters",
            field, max_chars
        )));
    }
    Ok(trimmed.to_string())
}
