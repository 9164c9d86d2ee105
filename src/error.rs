//! Error management.

use crate::schema::ValueType;
use derive_more::Display;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error raised by user code inside `init`, `compute` or `master_compute`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "invalid configuration: {}", _0)]
    InvalidConfig(String),
    #[display(fmt = "invalid schema: {}", _0)]
    InvalidSchema(String),
    #[display(fmt = "unknown node property `{}`", _0)]
    UnknownProperty(String),
    #[display(
        fmt = "node property `{}` has type {}, but {} was requested",
        key,
        actual,
        requested
    )]
    TypeMismatch {
        key: String,
        actual: ValueType,
        requested: ValueType,
    },
    #[display(fmt = "computation failed: {}", _0)]
    Computation(BoxError),
    #[display(
        fmt = "estimated memory {} bytes exceeds available memory {} bytes",
        required,
        available
    )]
    InsufficientMemory { required: u64, available: u64 },
    #[display(fmt = "{}", _0)]
    Io(std::io::Error),
    #[display(fmt = "parse error: {}", _0)]
    Parse(String),
}

impl Error {
    /// Wraps an error raised by a user computation.
    pub fn computation<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Computation(error.into())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Computation(e) => Some(e.as_ref()),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
