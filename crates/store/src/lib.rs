//! Flattened configuration store for juiceconfig
//!
//! A JSON document is flattened once at load time into a single-level map
//! keyed by dotted paths (`{"app":{"name":"x"}}` becomes `app.name`).
//! Typed lookups record the first failure on the store so a caller can run
//! a batch of reads and check `was_error()` once at the end.

mod flatten;
mod store;
mod value;

pub use flatten::*;
pub use store::*;
pub use value::*;

pub use juiceconfig_source::{ErrorKind, Resolver, SourceError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Error parsing config [{0}]")]
    Json(#[from] serde_json::Error),

    #[error("Error parsing config [expected a JSON object at the top level, found {0}]")]
    NotAnObject(&'static str),

    #[error("Value not found [{path}]")]
    NotFound { path: String },

    #[error("Value is not {expected} [{path}]")]
    TypeMismatch {
        path: String,
        expected: &'static str,
    },

    #[error("Already had error")]
    AlreadyFailed,
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Source(e) => e.kind(),
            ConfigError::Json(_) | ConfigError::NotAnObject(_) => ErrorKind::Parse,
            ConfigError::NotFound { .. } => ErrorKind::NotFound,
            ConfigError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            ConfigError::AlreadyFailed => ErrorKind::AlreadyFailed,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
