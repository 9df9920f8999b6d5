//! Raw document retrieval for a selector

use crate::{AwsSecretsManager, Result, SecretsStore, Selector, SourceError};
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves selectors to raw configuration bytes
///
/// Every call performs exactly one read against the backend; there is no
/// caching and no retry.
#[derive(Clone)]
pub struct Resolver {
    secrets: Arc<dyn SecretsStore>,
}

impl Resolver {
    /// Resolver backed by AWS Secrets Manager configured from the environment
    pub fn new() -> Self {
        Self::with_secrets_store(AwsSecretsManager::from_env())
    }

    pub fn with_secrets_store(secrets: impl SecretsStore + 'static) -> Self {
        Self {
            secrets: Arc::new(secrets),
        }
    }

    pub fn with_shared_secrets_store(secrets: Arc<dyn SecretsStore>) -> Self {
        Self { secrets }
    }

    /// Parse `selector` and read the document it names
    pub fn resolve(&self, selector: &str) -> Result<Vec<u8>> {
        let selector = Selector::parse(selector)?;
        self.fetch(&selector)
    }

    /// Read the document named by an already parsed selector
    pub fn fetch(&self, selector: &Selector) -> Result<Vec<u8>> {
        debug!(scheme = %selector.scheme(), "Resolving config source");

        match selector {
            Selector::File { path } => {
                std::fs::read(path).map_err(|source| SourceError::Io {
                    path: path.clone(),
                    source,
                })
            }
            Selector::SecretsManager {
                region,
                secret_name,
            } => match self.secrets.get_secret_string(region, secret_name) {
                Ok(secret) => Ok(secret.into_bytes()),
                Err(e) => {
                    warn!(%region, %secret_name, "Unable to access secrets store: {}", e);
                    Err(SourceError::Backend(e))
                }
            },
            Selector::Environment { variable } => match std::env::var_os(variable) {
                Some(value) if !value.is_empty() => Ok(value.into_encoded_bytes()),
                _ => Err(SourceError::EnvironmentNotSet {
                    variable: variable.clone(),
                }),
            },
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

/// Resolve a selector with the default resolver
pub fn resolve(selector: &str) -> Result<Vec<u8>> {
    Resolver::new().resolve(selector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, StaticSecrets};
    use serial_test::serial;
    use std::io::Write;

    fn static_resolver() -> Resolver {
        Resolver::with_secrets_store(
            StaticSecrets::new().with_secret("us-east-1", "mysecret", r#"{"db":{"port":5432}}"#),
        )
    }

    #[test]
    fn test_resolve_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(br#"{"a":1}"#).unwrap();
        file.flush().unwrap();

        let selector = format!("file:::{}", file.path().display());
        let bytes = static_resolver().resolve(&selector).unwrap();
        assert_eq!(bytes, br#"{"a":1}"#);
    }

    #[test]
    fn test_resolve_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = static_resolver()
            .resolve(&format!("file:::{}", path.display()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn test_resolve_secret() {
        let bytes = static_resolver()
            .resolve("secrets_manager:::us-east-1:::mysecret")
            .unwrap();
        assert_eq!(bytes, br#"{"db":{"port":5432}}"#);
    }

    #[test]
    fn test_resolve_missing_secret_is_backend_error() {
        let err = static_resolver()
            .resolve("secrets_manager:::us-east-1:::other")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
    }

    #[test]
    #[serial]
    fn test_resolve_environment() {
        temp_env::with_var("JUICE_TEST_RESOLVE", Some(r#"{"x":true}"#), || {
            let bytes = static_resolver()
                .resolve("environment:::JUICE_TEST_RESOLVE")
                .unwrap();
            assert_eq!(bytes, br#"{"x":true}"#);
        });
    }

    #[test]
    #[serial]
    fn test_unset_and_empty_environment_are_not_found() {
        temp_env::with_var("JUICE_TEST_RESOLVE", None::<&str>, || {
            let err = static_resolver()
                .resolve("environment:::JUICE_TEST_RESOLVE")
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        });

        temp_env::with_var("JUICE_TEST_RESOLVE", Some(""), || {
            let err = static_resolver()
                .resolve("environment:::JUICE_TEST_RESOLVE")
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
            assert_eq!(
                err.to_string(),
                "Environment variable not set [JUICE_TEST_RESOLVE]"
            );
        });
    }

    #[test]
    fn test_invalid_selector() {
        let err = static_resolver().resolve("bogus:::x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSelector);
    }
}
