use core::fmt;

/// Result alias for `wordclass`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the clustering engine and its collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Token sequence was empty.
    EmptyInput,

    /// Fewer than two classes passed the frequency filter.
    TooFewClasses {
        /// Number of filtered classes found.
        found: usize,
        /// Frequency threshold in effect.
        min_frequency: usize,
    },

    /// Requested class count cannot be reached by merging.
    InvalidClassCount {
        /// Requested number of classes.
        requested: usize,
        /// Number of filtered classes available.
        available: usize,
    },

    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// Token is not part of the vocabulary.
    UnknownToken(String),

    /// Persisted history or config could not be (de)serialized.
    Serialization(String),
}

impl Error {
    /// True for errors caused by the run configuration rather than the input.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::TooFewClasses { .. }
                | Error::InvalidClassCount { .. }
                | Error::InvalidParameter { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty token sequence"),
            Error::TooFewClasses {
                found,
                min_frequency,
            } => write!(
                f,
                "need at least 2 classes with frequency >= {min_frequency}, found {found}"
            ),
            Error::InvalidClassCount {
                requested,
                available,
            } => write!(f, "cannot cluster {available} classes down to {requested}"),
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
            Error::UnknownToken(token) => write!(f, "unknown token '{token}'"),
            Error::Serialization(msg) => write!(f, "serialization failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
