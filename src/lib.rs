//! juiceconfig: one way to read application configuration from a JSON file,
//! AWS Secrets Manager, or an environment variable holding JSON.
//!
//! The source is chosen at runtime by a selector string:
//!
//! - `file:::/etc/app/config.json`
//! - `secrets_manager:::us-east-1:::prod/app`
//! - `environment:::APP_CONFIG`
//!
//! Nested objects are flattened to dotted paths, so `{"db":{"port":5432}}`
//! is read with `get_int("db.port")`.
//!
//! ```no_run
//! let config = juiceconfig::load("file:::/etc/app/config.json")?;
//! let host = config.get_string("database.host").unwrap_or_default();
//! let port = config.get_int_or("database.port", 5432).unwrap_or_default();
//! if config.was_error() {
//!     eprintln!("bad config: {}", config.error_message());
//! }
//! # Ok::<(), juiceconfig::ConfigError>(())
//! ```
//!
//! The free functions in this crate ([`get_string`], [`get_int`], ...) read
//! from a process-wide store built on first use from the selector in the
//! `JUICE_CONFIG` environment variable.

mod default;

pub use default::*;

pub use juiceconfig_source::{
    resolve, sigv4, AwsCredentials, AwsSecretsManager, BackendError, ErrorKind, Resolver, Scheme,
    SecretsManagerConfig, SecretsStore, Selector, SourceError, StaticSecrets,
    ENVIRONMENT_PREFIX, FILE_PREFIX, SECRETS_MANAGER_PREFIX, SEPARATOR,
};
pub use juiceconfig_store::{
    flatten, ConfigError, ConfigStore, ConfigValue, FromConfigValue, Result, PATH_SEPARATOR,
};

/// Load a store from a selector with the default resolver
pub fn load(selector: &str) -> Result<ConfigStore> {
    ConfigStore::load(selector)
}
