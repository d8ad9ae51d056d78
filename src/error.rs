use thiserror::Error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Key-value store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors (missing or malformed input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Not enough credits to perform an action
    #[error("Insufficient credits: available {available}, required {required}")]
    InsufficientCredits { available: u64, required: u64 },

    /// Operation conflicts with current state (e.g. a run is already active)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No user session
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Message(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Check if error means the caller should be prompted to top up
    pub fn is_out_of_credits(&self) -> bool {
        matches!(self, AppError::InsufficientCredits { .. })
    }

    /// Get HTTP-style status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Unauthorized(_) => 401,
            AppError::Validation(_) => 400,
            AppError::InsufficientCredits { .. } => 402,
            AppError::Conflict(_) => 409,
            AppError::Config(_) => 500,
            AppError::Store(_) => 500,
            _ => 500,
        }
    }
}

/// Key-value store error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error in a file-backed store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value under a key is not valid JSON for the requested type
    #[error("Corrupt value under key '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Lock poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Convenience function to convert Option<T> to Result<T, AppError>
pub fn option_to_result<T>(opt: Option<T>, error_msg: &str) -> AppResult<T> {
    opt.ok_or_else(|| AppError::NotFound(error_msg.to_string()))
}
