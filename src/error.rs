use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Malformed or empty submission body. Never retried.
    Validation(String),
    /// Bad or missing flush secret.
    Auth,
    /// Another flush currently holds the promotion lock.
    LockContention,
    /// I/O failure, timeout, or unexpected response from the record store.
    Store(String),
    /// A stored entry failed to decode as a record.
    Parse(serde_json::Error),
}

impl Error {
    /// Suggested HTTP status for transport adapters.
    pub fn status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Auth => 401,
            Error::LockContention => 423,
            Error::Store(_) | Error::Parse(_) => 500,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(msg) => write!(f, "Invalid submission: {}", msg),
            Error::Auth => write!(f, "Bad or missing flush secret"),
            Error::LockContention => write!(f, "Another flush is already running"),
            Error::Store(msg) => write!(f, "Record store error: {}", msg),
            Error::Parse(err) => write!(f, "Failed to decode record: {}", err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err)
    }
}

impl std::error::Error for Error {}
