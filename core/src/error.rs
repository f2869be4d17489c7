use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Session rejected: {0}")]
    Unauthorized(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Operation timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Access token is not valid")]
    InvalidToken,

    #[error("Access token expired at {expired_at}")]
    TokenExpired { expired_at: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Map a free-text failure message coming back from a remote call onto
    /// the error taxonomy.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("failed to fetch")
            || lower.contains("network")
            || lower.contains("connection")
        {
            LedgerError::Network(message.to_string())
        } else if lower.contains("jwt") || lower.contains("session") {
            LedgerError::Unauthorized(message.to_string())
        } else if lower.contains("timeout") || lower.contains("timed out") {
            LedgerError::Timeout { elapsed_ms: 0 }
        } else {
            LedgerError::Other(anyhow::anyhow!(message.to_string()))
        }
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Network(_) => true,
            LedgerError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Message suitable for showing to an operator.
    pub fn user_message(&self) -> String {
        match self {
            LedgerError::Network(_) => {
                "Connection problem. Check your network and try again.".to_string()
            }
            LedgerError::Unauthorized(_) => {
                "Your session has expired. Please sign in again.".to_string()
            }
            LedgerError::NotFound { entity, .. } => format!("The requested {entity} was not found."),
            LedgerError::Timeout { .. } => "The request took too long. Please retry.".to_string(),
            LedgerError::Cancelled => "The request was cancelled.".to_string(),
            LedgerError::InvalidToken => "This access link is not valid.".to_string(),
            LedgerError::TokenExpired { .. } => "This access link has expired.".to_string(),
            LedgerError::InvalidOperation(reason) => reason.clone(),
            LedgerError::Database(_)
            | LedgerError::Serialization(_)
            | LedgerError::Io(_)
            | LedgerError::Other(_) => {
                format!("Unexpected error: {self}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognises_fetch_and_jwt_failures() {
        assert!(matches!(
            LedgerError::classify("TypeError: Failed to fetch"),
            LedgerError::Network(_)
        ));
        assert!(matches!(
            LedgerError::classify("JWT expired"),
            LedgerError::Unauthorized(_)
        ));
        assert!(matches!(
            LedgerError::classify("something odd"),
            LedgerError::Other(_)
        ));
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(LedgerError::Network("down".into()).is_retryable());
        assert!(!LedgerError::Unauthorized("jwt".into()).is_retryable());
        assert!(!LedgerError::not_found("client", 7).is_retryable());
    }

    #[test]
    fn user_message_names_missing_entity() {
        let msg = LedgerError::not_found("client", 7).user_message();
        assert_eq!(msg, "The requested client was not found.");
    }
}
