//! Error handling module
//!
//! Errors raised while probing raw results. None of them ever leaves the
//! observer: every one is logged and turned into a default value.

use thiserror::Error;
use tracing::Level;

/// Extraction error types
#[derive(Error, Debug)]
pub enum UsageError {
    /// Expected field is absent (or null)
    #[error("Field not found: {0}")]
    MissingField(String),

    /// Field exists but holds a value of the wrong type or range
    #[error("Field {path} has an unexpected value: {found}")]
    MistypedField { path: String, found: String },

    /// None of the shapes a parser declares matched the result
    #[error("Unknown response shape")]
    UnknownShape,

    /// The parser has no extraction rule for the invoked method
    #[error("Unsupported call site: {0}")]
    UnsupportedCallSite(String),

    /// Serialization/deserialization error (embedded JSON bodies, chunk values)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Parser code panicked; contained by the handler
    #[error("Parser panicked: {0}")]
    ParserPanic(String),
}

impl UsageError {
    /// Tracing level this error is reported at
    ///
    /// Missing data is routine for partial stream chunks and older SDK
    /// versions, so it stays at debug. A panic is a bug in a parser.
    pub fn log_level(&self) -> Level {
        match self {
            UsageError::MissingField(_)
            | UsageError::MistypedField { .. }
            | UsageError::UnknownShape
            | UsageError::UnsupportedCallSite(_)
            | UsageError::Serialization(_) => Level::DEBUG,
            UsageError::ParserPanic(_) => Level::WARN,
        }
    }

    /// Whether the error means "no data here" rather than "bad data here"
    pub fn is_absence(&self) -> bool {
        matches!(self, UsageError::MissingField(_) | UsageError::UnknownShape)
    }

    /// Build a panic error from a `catch_unwind` payload
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        UsageError::ParserPanic(message)
    }
}

/// Result type alias
pub type UsageResult<T> = Result<T, UsageError>;

/// Error context extension trait
pub trait ErrorContext<T> {
    /// Report a failure as a mistyped value at `path`
    fn field_context(self, path: &str) -> UsageResult<T>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn field_context(self, path: &str) -> UsageResult<T> {
        self.map_err(|e| UsageError::MistypedField {
            path: path.to_string(),
            found: e.to_string(),
        })
    }
}

/// Emit an error at its own level
///
/// `tracing` macros need a constant level, hence the match.
pub fn log_usage_error(error: &UsageError, library: &str, context: &str) {
    match error.log_level() {
        Level::WARN => tracing::warn!("{} failed for library {}: {}", context, library, error),
        Level::DEBUG => tracing::debug!("{} for library {}: {}", context, library, error),
        _ => tracing::trace!("{} for library {}: {}", context, library, error),
    }
}
