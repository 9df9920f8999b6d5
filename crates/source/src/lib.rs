//! Source resolution for juiceconfig
//!
//! A selector string names where a configuration document lives:
//! - `file:::<path>` reads a local file
//! - `secrets_manager:::<region>:::<secret name>` fetches the current version of an AWS secret
//! - `environment:::<variable>` reads an environment variable holding JSON
//!
//! Resolution returns the raw bytes of the document; parsing happens in the store.

mod credentials;
mod resolver;
mod secrets;
mod selector;
pub mod sigv4;

pub use credentials::*;
pub use resolver::*;
pub use secrets::*;
pub use selector::*;

use std::path::PathBuf;

/// Broad classification shared by every juiceconfig error type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Selector matched none of the known schemes
    InvalidSelector,
    /// Selector grammar or JSON syntax problem
    Parse,
    /// Local file could not be read
    Io,
    /// Secrets store call failed
    Backend,
    /// Missing environment variable or missing config path
    NotFound,
    /// Config path holds a value of another type
    TypeMismatch,
    /// Store already carries an earlier lookup failure
    AlreadyFailed,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Invalid URL for JuiceConfig [{0}]")]
    InvalidSelector(String),

    #[error("Invalid URL [{0}]")]
    MalformedSelector(String),

    #[error("Unable to open config file [{}]: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to access AWS Secrets Manager [{0}]")]
    Backend(#[from] BackendError),

    #[error("Environment variable not set [{variable}]")]
    EnvironmentNotSet { variable: String },
}

impl SourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::InvalidSelector(_) => ErrorKind::InvalidSelector,
            SourceError::MalformedSelector(_) => ErrorKind::Parse,
            SourceError::Io { .. } => ErrorKind::Io,
            SourceError::Backend(_) => ErrorKind::Backend,
            SourceError::EnvironmentNotSet { .. } => ErrorKind::NotFound,
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
