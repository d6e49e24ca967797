use thiserror::Error;

/// Error categories every connector failure falls into.
///
/// The kind decides who handles the failure: `Auth` and `Exchange` go back to the
/// caller verbatim, `Transport` is retried by the WebSocket state machine (never by the
/// REST dispatcher), `Protocol` is logged and only escalates when it keeps recurring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Auth,
    Transport,
    Exchange,
    Protocol,
    Config,
}

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("API error: {code} - {message}")]
    ApiError { code: String, message: String },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

impl ExchangeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthError(_) => ErrorKind::Auth,
            Self::NetworkError(_)
            | Self::ConnectionTimeout(_)
            | Self::WebSocketError(_) => ErrorKind::Transport,
            Self::ApiError { .. } => ErrorKind::Exchange,
            Self::DeserializationError(_) | Self::SerializationError(_) => ErrorKind::Protocol,
            Self::InvalidParameters(_) | Self::ConfigurationError(_) | Self::ConfigError(_) => {
                ErrorKind::Config
            }
        }
    }

    /// Transport failures are the only ones a reconnect can fix.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(e: serde_json::Error) -> Self {
        Self::DeserializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ExchangeError::AuthError("missing key".to_string()).kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            ExchangeError::ConnectionTimeout("ws".to_string()).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            ExchangeError::ApiError {
                code: "-1121".to_string(),
                message: "Invalid symbol.".to_string()
            }
            .kind(),
            ErrorKind::Exchange
        );
        assert_eq!(
            ExchangeError::DeserializationError("eof".to_string()).kind(),
            ErrorKind::Protocol
        );
    }

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(ExchangeError::NetworkError("reset".to_string()).is_retryable());
        assert!(!ExchangeError::AuthError("bad".to_string()).is_retryable());
        assert!(!ExchangeError::ApiError {
            code: "429".to_string(),
            message: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn test_api_error_display_keeps_code() {
        let err = ExchangeError::ApiError {
            code: "api-signature-not-valid".to_string(),
            message: "Signature not valid".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error: api-signature-not-valid - Signature not valid"
        );
    }
}
