use thiserror::Error;

/// Every failure a single user action can end in.
///
/// None of these are retried: the action is abandoned and the caller reports
/// the message. Storage state is left as it was before the action began.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Input that cannot be accepted (non-numeric, out of range, missing selection).
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// The write would leave a dangling reference, e.g. deleting a client that still has orders.
    #[error("{0}")]
    Referential(String),

    /// The record the action refers to does not exist (any more).
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("database error: {}", sqlite_error_string(.0))]
    Storage(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to render document: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        LedgerError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub(crate) fn sqlite_error_string(err: &rusqlite::Error) -> String {
    match err {
        rusqlite::Error::SqliteFailure(code, msg) => {
            let message = msg.clone().unwrap_or_default();
            format!(
                "sqlite(code={:?}, extended_code={}, msg={})",
                code.code, code.extended_code, message
            )
        }
        other => other.to_string(),
    }
}

/// Parses a numeric form field; rejects blanks, garbage and non-finite values.
pub fn parse_number(field: &'static str, input: &str) -> Result<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation(field, "a number is required"));
    }
    let v: f64 = trimmed
        .parse()
        .map_err(|_| LedgerError::validation(field, format!("'{trimmed}' is not a number")))?;
    if !v.is_finite() {
        return Err(LedgerError::validation(field, format!("'{trimmed}' is not a finite number")));
    }
    Ok(v)
}

/// Like [`parse_number`], but a blank field means "not given".
pub fn parse_optional_number(field: &'static str, input: &str) -> Result<Option<f64>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    parse_number(field, input).map(Some)
}
