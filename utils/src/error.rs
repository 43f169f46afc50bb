use std::error::Error as StdError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Application error: a human readable message plus the error that caused it, if any.
#[derive(Debug, Error)]
#[error("{msg}")]
pub struct Error {
    msg: String,
    #[source]
    source: Option<BoxedSource>,
}

impl Error {
    pub fn new(msg: &str) -> Self {
        Self {
            msg: msg.to_string(),
            source: None,
        }
    }

    pub fn with_source(msg: &str, source: BoxedSource) -> Self {
        Self {
            msg: msg.to_string(),
            source: Some(source),
        }
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source("I/O error", Box::new(err))
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::with_source("Configuration error", Box::new(err))
    }
}

impl From<log::SetLoggerError> for Error {
    fn from(err: log::SetLoggerError) -> Self {
        Error::with_source("Logger setup error", Box::new(err))
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        // PoisonError carries the guard, which is not Send
        Error::new(&format!("Lock poisoned: {}", err))
    }
}
