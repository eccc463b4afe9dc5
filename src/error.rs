//! Error types for the roster library.
//!
//! Internal code works with `Res<T>` (an `anyhow` result) and adds context as it goes. Anything that
//! crosses the public API is converted into an `Error` that also carries an `ErrorType`, which
//! decides what the user gets to see, what HTTP status is used and how loudly it is logged.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt::{Debug, Display, Formatter};

/// The internal result type.
pub(crate) type Res<T> = std::result::Result<T, anyhow::Error>;

/// The result type returned by public functions.
pub type Result<T> = std::result::Result<T, Error>;

const DECODING_MESSAGE: &str = "Processing the file failed. Make sure the file format is correct.";
const INTERNAL_MESSAGE: &str = "An error occurred on the server.";

/// Classifies an `Error` by who caused it and what should happen next.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// The upload credential did not match.
    Unauthorized,
    /// Missing file, empty sheet, no usable rows, unknown file format.
    UserInput,
    /// No student has the requested code.
    NotFound,
    /// The uploaded bytes could not be read as a spreadsheet.
    Decoding,
    /// Reading or replacing the stored records failed.
    Storage,
    /// A stored payload could not be deserialized.
    DataIntegrity,
    /// The home directory or config file is missing or invalid.
    Config,
    /// The server could not bind or serve.
    Service,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

impl ErrorType {
    /// The HTTP status code used when this error ends a request.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorType::Unauthorized => 401,
            ErrorType::UserInput => 400,
            ErrorType::NotFound => 404,
            ErrorType::Decoding => 422,
            ErrorType::Storage
            | ErrorType::DataIntegrity
            | ErrorType::Config
            | ErrorType::Service => 500,
        }
    }

    /// Whether the error was caused by the user and is expected during normal operation. These are
    /// not system faults and are not logged at error severity.
    pub fn is_user_error(self) -> bool {
        matches!(
            self,
            ErrorType::Unauthorized | ErrorType::UserInput | ErrorType::NotFound
        )
    }
}

/// The public error type. Wraps the `anyhow` error chain together with its `ErrorType`.
pub struct Error {
    error_type: ErrorType,
    inner: anyhow::Error,
}

impl Error {
    pub(crate) fn new(error_type: ErrorType, inner: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            inner: inner.into(),
        }
    }

    /// Creates an error from a plain message. Used for user errors where the message is the whole
    /// story.
    pub(crate) fn message(error_type: ErrorType, message: impl Display) -> Self {
        Self::new(error_type, anyhow::anyhow!("{message}"))
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// The message that can be shown to the person who made the request. User errors show their
    /// own message; everything else gets a generic message so internals do not leak.
    pub fn user_message(&self) -> String {
        match self.error_type {
            ErrorType::Unauthorized | ErrorType::UserInput | ErrorType::NotFound => {
                self.inner.to_string()
            }
            ErrorType::Decoding => DECODING_MESSAGE.to_string(),
            _ => INTERNAL_MESSAGE.to_string(),
        }
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.inner)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:?}", self.error_type, self.inner)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.inner.as_ref())
    }
}

/// Converts any result whose error converts to `anyhow::Error` into a public `Result`.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e))
    }
}
