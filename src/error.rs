use thiserror::Error;

/// Type alias for Result with UnsubError
pub type Result<T> = std::result::Result<T, UnsubError>;

/// Error types for the unsubscribe workflow
#[derive(Error, Debug)]
pub enum UnsubError {
    /// The mailbox domain has no configured IMAP server
    #[error("Unsupported email domain: {0}")]
    UnsupportedDomain(String),

    /// Login was rejected by the server
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Network-related error (connection issues, TLS, protocol)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A transport call exceeded its deadline
    #[error("{operation} timed out after {secs} seconds")]
    Timeout { operation: String, secs: u64 },

    /// A single message could not be retrieved
    #[error("Failed to fetch message {id}: {message}")]
    FetchError { id: String, message: String },

    /// Invalid message format or parsing error
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Persisted state could not be read or written
    #[error("State error: {0}")]
    StateError(String),

    /// Launching a link failed
    #[error("Failed to open link {url}: {message}")]
    OpenError { url: String, message: String },

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic catch-all error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl UnsubError {
    /// Errors that end the run before the review session starts
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            UnsubError::UnsupportedDomain(_)
                | UnsubError::AuthError(_)
                | UnsubError::ConfigError(_)
        )
    }

    /// Errors scoped to a single message; the batch carries on without it
    ///
    /// Anything else means the mailbox can no longer be read.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            UnsubError::FetchError { .. }
                | UnsubError::InvalidMessageFormat(_)
                | UnsubError::Timeout { .. }
        )
    }
}

impl From<mailparse::MailParseError> for UnsubError {
    fn from(error: mailparse::MailParseError) -> Self {
        UnsubError::InvalidMessageFormat(error.to_string())
    }
}

impl From<imap::error::Error> for UnsubError {
    fn from(error: imap::error::Error) -> Self {
        match error {
            imap::error::Error::No(ref response) | imap::error::Error::Bad(ref response) => {
                UnsubError::NetworkError(format!("server rejected command: {}", response))
            }
            imap::error::Error::Io(err) => UnsubError::NetworkError(err.to_string()),
            other => UnsubError::NetworkError(other.to_string()),
        }
    }
}
