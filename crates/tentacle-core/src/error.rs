//! Error types for the Tentacle policy engine

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type shared by the gateway-facing crates
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header name or value rejected by the HTTP layer
    #[error("Invalid header '{name}': {message}")]
    InvalidHeader {
        /// Header name as supplied
        name: String,
        /// Why it was rejected
        message: String,
    },

    /// Status code outside the valid HTTP range
    #[error("Invalid status code: {0}")]
    InvalidStatus(i64),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] http::Error),
}

impl Error {
    /// Convert error to HTTP status code
    pub fn to_status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::InvalidHeader { .. } | Error::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Create an invalid header error
    pub fn invalid_header(name: impl Into<String>, message: impl ToString) -> Self {
        Error::InvalidHeader {
            name: name.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            Error::invalid_header("x bad", "invalid character").to_status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Config("missing".to_string()).to_status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_invalid_header_display() {
        let err = Error::invalid_header("x bad", "invalid character");
        assert!(err.to_string().contains("x bad"));
        assert!(err.to_string().contains("invalid character"));
    }
}
