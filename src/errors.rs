use std::fmt;

/// Error type for page storage and tree operations, including specific error codes.
///
/// Each variant represents a distinct error condition with a unique error code for easier debugging
/// and error handling in applications.
#[derive(Debug)]
pub enum Error {
    /// I/O-related error raised by a storage backend.
    /// Error code: 1000
    Io(std::io::Error),
    /// Storage contract error (e.g., unknown page id, wrong buffer length).
    /// Error code: 2000
    Storage(String),
    /// A page or file header does not hold what the tree expects.
    /// Error code: 3000
    Corrupt(String),
    /// Header serialization/deserialization error.
    /// Error code: 4000
    Encoding(String),
    /// Page geometry cannot hold the configured key/value/summary widths.
    /// Error code: 5000
    Config(String),
    /// Caller bug detected at runtime (e.g., insert into a full node).
    /// Error code: 6000
    Precondition(String),
    /// Operation declared by the tree but not supported.
    /// Error code: 7000
    Unimplemented(String),
    /// Miscellaneous uncategorized error.
    /// Error code: 9000
    Other(String),
}

impl Error {
    /// Returns the error code associated with this error variant.
    ///
    /// # Examples
    /// ```
    /// use pagetree::errors::Error;
    /// let err = Error::Corrupt("bad discriminant".to_string());
    /// assert_eq!(err.code(), 3000);
    /// ```
    pub fn code(&self) -> u32 {
        match self {
            Error::Io(_) => 1000,
            Error::Storage(_) => 2000,
            Error::Corrupt(_) => 3000,
            Error::Encoding(_) => 4000,
            Error::Config(_) => 5000,
            Error::Precondition(_) => 6000,
            Error::Unimplemented(_) => 7000,
            Error::Other(_) => 9000,
        }
    }

    /// Returns a human-readable error category for this error variant.
    ///
    /// # Examples
    /// ```
    /// use pagetree::errors::Error;
    /// let err = Error::Unimplemented("remove".to_string());
    /// assert_eq!(err.category(), "Unimplemented");
    /// ```
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "I/O",
            Error::Storage(_) => "Storage",
            Error::Corrupt(_) => "Corrupt",
            Error::Encoding(_) => "Encoding",
            Error::Config(_) => "Config",
            Error::Precondition(_) => "Precondition",
            Error::Unimplemented(_) => "Unimplemented",
            Error::Other(_) => "Other",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "[{}] I/O Error: {}", self.code(), e),
            Error::Storage(msg) => write!(f, "[{}] Storage Error: {}", self.code(), msg),
            Error::Corrupt(msg) => write!(f, "[{}] Corrupt Page: {}", self.code(), msg),
            Error::Encoding(msg) => write!(f, "[{}] Encoding Error: {}", self.code(), msg),
            Error::Config(msg) => write!(f, "[{}] Config Error: {}", self.code(), msg),
            Error::Precondition(msg) => {
                write!(f, "[{}] Precondition Violated: {}", self.code(), msg)
            }
            Error::Unimplemented(msg) => {
                write!(f, "[{}] Unimplemented Operation: {}", self.code(), msg)
            }
            Error::Other(msg) => write!(f, "[{}] Unknown Error: {}", self.code(), msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<bincode::error::EncodeError> for Error {
    fn from(err: bincode::error::EncodeError) -> Self {
        Error::Encoding(format!("Failed to encode header. {}", err))
    }
}

impl From<bincode::error::DecodeError> for Error {
    fn from(err: bincode::error::DecodeError) -> Self {
        Error::Encoding(format!("Failed to decode header. {}", err))
    }
}

/// Convenience macro to create an `Error` with a formatted message.
///
/// # Examples
/// ```
/// use pagetree::err;
/// let err = err!(Storage, "Page {} not found", 7);
/// assert_eq!(err.code(), 2000);
/// assert_eq!(err.to_string(), "[2000] Storage Error: Page 7 not found");
/// ```
#[macro_export]
macro_rules! err {
    ($variant:ident, $msg:expr) => {
        $crate::errors::Error::$variant($msg.to_string())
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        $crate::errors::Error::$variant(format!($fmt, $($arg)*))
    };
}
