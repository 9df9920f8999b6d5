//! Selector grammar
//!
//! ```text
//! selector         := file_selector | secrets_selector | env_selector
//! file_selector    := "file:::" path
//! secrets_selector := "secrets_manager:::" region ":::" secret_name
//! env_selector     := "environment:::" variable_name
//! ```

use crate::{Result, SourceError};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const FILE_PREFIX: &str = "file:::";
pub const SECRETS_MANAGER_PREFIX: &str = "secrets_manager:::";
pub const ENVIRONMENT_PREFIX: &str = "environment:::";

/// Separator between selector fields
pub const SEPARATOR: &str = ":::";

/// Backend a selector points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    File,
    SecretsManager,
    Environment,
}

impl Scheme {
    pub const ALL: [Scheme; 3] = [Scheme::File, Scheme::SecretsManager, Scheme::Environment];

    pub fn prefix(self) -> &'static str {
        match self {
            Scheme::File => FILE_PREFIX,
            Scheme::SecretsManager => SECRETS_MANAGER_PREFIX,
            Scheme::Environment => ENVIRONMENT_PREFIX,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::File => "file",
            Scheme::SecretsManager => "secrets_manager",
            Scheme::Environment => "environment",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed source selector
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    File { path: PathBuf },
    SecretsManager { region: String, secret_name: String },
    Environment { variable: String },
}

impl Selector {
    /// Parse a selector string
    ///
    /// Prefix matching is case sensitive. For secrets manager selectors the
    /// payload is split at the first `:::`, so the secret name may itself
    /// contain the separator.
    pub fn parse(selector: &str) -> Result<Self> {
        if let Some(path) = selector.strip_prefix(FILE_PREFIX) {
            return Ok(Selector::File {
                path: PathBuf::from(path),
            });
        }

        if let Some(payload) = selector.strip_prefix(SECRETS_MANAGER_PREFIX) {
            let (region, secret_name) = payload
                .split_once(SEPARATOR)
                .ok_or_else(|| SourceError::MalformedSelector(selector.to_string()))?;

            if region.is_empty() || secret_name.is_empty() {
                return Err(SourceError::MalformedSelector(selector.to_string()));
            }

            return Ok(Selector::SecretsManager {
                region: region.to_string(),
                secret_name: secret_name.to_string(),
            });
        }

        if let Some(variable) = selector.strip_prefix(ENVIRONMENT_PREFIX) {
            return Ok(Selector::Environment {
                variable: variable.to_string(),
            });
        }

        Err(SourceError::InvalidSelector(selector.to_string()))
    }

    pub fn scheme(&self) -> Scheme {
        match self {
            Selector::File { .. } => Scheme::File,
            Selector::SecretsManager { .. } => Scheme::SecretsManager,
            Selector::Environment { .. } => Scheme::Environment,
        }
    }
}

impl FromStr for Selector {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::File { path } => write!(f, "{}{}", FILE_PREFIX, path.display()),
            Selector::SecretsManager {
                region,
                secret_name,
            } => write!(
                f,
                "{}{}{}{}",
                SECRETS_MANAGER_PREFIX, region, SEPARATOR, secret_name
            ),
            Selector::Environment { variable } => write!(f, "{}{}", ENVIRONMENT_PREFIX, variable),
        }
    }
}
