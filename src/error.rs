//! Error types for the crate.
//!
//! Internally we use `anyhow` (`Res<T>`) and attach context as errors bubble up. At the boundary of
//! a public operation the error is converted, with `pub_result`, into an `Error` that carries an
//! `ErrorType`. Callers only ever need to branch on the `ErrorType`.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// The internal result type.
pub(crate) type Res<T> = anyhow::Result<T>;

/// The public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The kinds of failure that a caller may need to react to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Bad input, e.g. a required field was missing. Nothing was changed.
    Validation,
    /// The requested id does not exist.
    NotFound,
    /// The operation would break referential integrity, e.g. deleting a category in use.
    Conflict,
    /// Reading or writing the local store failed.
    Persistence,
    /// The remote endpoint was unreachable or rejected the payload. Local data is unaffected.
    Sync,
    /// The home directory or configuration file is missing or invalid.
    Config,
    /// Anything else.
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// The public error type: an `ErrorType` plus the underlying `anyhow` error chain.
pub struct Error {
    error_type: ErrorType,
    inner: anyhow::Error,
}

impl Error {
    pub fn new(error_type: ErrorType, inner: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            inner: inner.into(),
        }
    }

    /// Creates an error of `error_type` from a plain message.
    pub(crate) fn msg(error_type: ErrorType, message: impl Display) -> Self {
        Self::new(error_type, anyhow::anyhow!("{message}"))
    }

    pub(crate) fn validation(message: impl Display) -> Self {
        Self::msg(ErrorType::Validation, message)
    }

    pub(crate) fn not_found(message: impl Display) -> Self {
        Self::msg(ErrorType::NotFound, message)
    }

    pub(crate) fn conflict(message: impl Display) -> Self {
        Self::msg(ErrorType::Conflict, message)
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
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

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

/// Converts an internal result into the public `Result`.
pub(crate) trait IntoResult<T> {
    /// Wraps the error with `error_type`. If the error already is an `Error`, its type is kept.
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| match e.into().downcast::<Error>() {
            Ok(typed) => typed,
            Err(other) => Error::new(error_type, other),
        })
    }
}
