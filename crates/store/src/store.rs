//! Flattened configuration store with sticky error tracking

use crate::{flatten, ConfigError, ConfigValue, FromConfigValue, Resolver, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Lookup failure remembered by the store until `reset_error`
#[derive(Debug, Clone, PartialEq, Eq)]
enum Failure {
    NotFound { path: String },
    TypeMismatch { path: String, expected: &'static str },
}

impl Failure {
    fn to_error(&self) -> ConfigError {
        match self {
            Failure::NotFound { path } => ConfigError::NotFound { path: path.clone() },
            Failure::TypeMismatch { path, expected } => ConfigError::TypeMismatch {
                path: path.clone(),
                expected: *expected,
            },
        }
    }
}

/// Configuration values loaded from one source
///
/// The value map never changes after load. Rather than checking every
/// lookup, callers may run a series of reads and check [`was_error`] at the
/// end: once a lookup fails, every later typed lookup fails with
/// [`ConfigError::AlreadyFailed`] until [`reset_error`] is called.
///
/// The error state sits behind its own lock, so lookups take `&self` and a
/// store shared between threads (or nested callers) tracks one failure.
///
/// [`was_error`]: ConfigStore::was_error
/// [`reset_error`]: ConfigStore::reset_error
#[derive(Debug, Default)]
pub struct ConfigStore {
    values: HashMap<String, ConfigValue>,
    selector: Option<String>,
    failure: Mutex<Option<Failure>>,
}

impl Clone for ConfigStore {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            selector: self.selector.clone(),
            failure: Mutex::new(self.failure().clone()),
        }
    }
}

impl ConfigStore {
    /// Load configuration from a selector using the default resolver
    pub fn load(selector: &str) -> Result<Self> {
        Self::load_with(&Resolver::new(), selector)
    }

    /// Load configuration from a selector using the given resolver
    pub fn load_with(resolver: &Resolver, selector: &str) -> Result<Self> {
        let bytes = resolver.resolve(selector)?;
        let mut store = Self::from_slice(&bytes)?;
        store.selector = Some(selector.to_string());
        Ok(store)
    }

    /// Parse and flatten a JSON document
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let document: Value = serde_json::from_slice(bytes)?;
        let object = match document {
            Value::Object(object) => object,
            Value::Null => return Err(ConfigError::NotAnObject("null")),
            Value::Bool(_) => return Err(ConfigError::NotAnObject("a boolean")),
            Value::Number(_) => return Err(ConfigError::NotAnObject("a number")),
            Value::String(_) => return Err(ConfigError::NotAnObject("a string")),
            Value::Array(_) => return Err(ConfigError::NotAnObject("an array")),
        };

        let values = flatten(object);
        info!(entries = values.len(), "Loaded config");

        Ok(Self {
            values,
            selector: None,
            failure: Mutex::new(None),
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_slice(json.as_bytes())
    }

    fn failure(&self) -> MutexGuard<'_, Option<Failure>> {
        // Only whole values are written under the lock
        self.failure.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The selector this store was loaded from, if any
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    /// Typed lookup with no default; a missing path is an error
    pub fn get<T: FromConfigValue>(&self, path: &str) -> Result<T> {
        self.lookup(path, None)
    }

    /// Typed lookup returning `default` when the path is absent
    ///
    /// A present value of the wrong type is still an error.
    pub fn get_or<T: FromConfigValue>(&self, path: &str, default: T) -> Result<T> {
        self.lookup(path, Some(default))
    }

    fn lookup<T: FromConfigValue>(&self, path: &str, default: Option<T>) -> Result<T> {
        let mut current = self.failure();
        if current.is_some() {
            return Err(ConfigError::AlreadyFailed);
        }

        let failure = match self.values.get(path) {
            Some(value) => match T::from_config_value(value) {
                Some(v) => return Ok(v),
                None => Failure::TypeMismatch {
                    path: path.to_string(),
                    expected: T::TYPE_NAME,
                },
            },
            None => match default {
                Some(v) => return Ok(v),
                None => Failure::NotFound {
                    path: path.to_string(),
                },
            },
        };

        let error = failure.to_error();
        debug!("Config lookup failed: {}", error);
        *current = Some(failure);
        Err(error)
    }

    pub fn get_string(&self, path: &str) -> Result<String> {
        self.get(path)
    }

    pub fn get_string_or(&self, path: &str, default: impl Into<String>) -> Result<String> {
        self.get_or(path, default.into())
    }

    pub fn get_int(&self, path: &str) -> Result<i64> {
        self.get(path)
    }

    pub fn get_int_or(&self, path: &str, default: i64) -> Result<i64> {
        self.get_or(path, default)
    }

    pub fn get_bool(&self, path: &str) -> Result<bool> {
        self.get(path)
    }

    pub fn get_bool_or(&self, path: &str, default: bool) -> Result<bool> {
        self.get_or(path, default)
    }

    /// Has a lookup failed since the last reset?
    pub fn was_error(&self) -> bool {
        self.failure().is_some()
    }

    /// Message of the first failure since the last reset, or an empty string
    pub fn error_message(&self) -> String {
        self.failure()
            .as_ref()
            .map(|f| f.to_error().to_string())
            .unwrap_or_default()
    }

    /// Clear the error flag and message; values are untouched
    pub fn reset_error(&self) {
        *self.failure() = None;
    }

    /// Run a batch of lookups and report the first failure as a typed error
    ///
    /// Lookups inside `f` may ignore their individual results. If any of them
    /// failed, the error recorded by the first failure is returned. The error
    /// flag stays set afterwards, as with any other failed lookup.
    pub fn batch<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> T,
    {
        if self.was_error() {
            return Err(ConfigError::AlreadyFailed);
        }

        let output = f(self);
        match &*self.failure() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(output),
        }
    }

    /// Raw flattened value at `path`; never touches the error state
    pub fn value(&self, path: &str) -> Option<&ConfigValue> {
        self.values.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.values.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All flattened paths, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.values.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}
