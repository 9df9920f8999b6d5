//! Process-wide default store
//!
//! Built on first use from the selector in `JUICE_CONFIG`. The lock is held
//! across the whole check-then-load, so concurrent first use loads once.
//! A failed load is not cached: the error is logged and returned, and the
//! next call tries again.
//!
//! The lock only guards the slot. Lookups run on a shared handle to the
//! store after it is released, so the accessors here may be called from
//! inside a [`with_default`] closure.

use juiceconfig_source::SourceError;
use juiceconfig_store::{ConfigStore, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

/// Environment variable holding the selector for the default store
pub const CONFIG_ENV_VAR: &str = "JUICE_CONFIG";

struct DefaultState {
    store: Option<Arc<ConfigStore>>,
    /// Message of the most recent failed load while no store is present
    load_error: Option<String>,
}

static DEFAULT_STATE: Mutex<DefaultState> = Mutex::new(DefaultState {
    store: None,
    load_error: None,
});

fn state() -> MutexGuard<'static, DefaultState> {
    // Every write to the state is a single assignment
    DEFAULT_STATE.lock().unwrap_or_else(PoisonError::into_inner)
}

fn load_from_env() -> Result<ConfigStore> {
    let selector = std::env::var(CONFIG_ENV_VAR)
        .ok()
        .filter(|selector| !selector.is_empty())
        .ok_or_else(|| SourceError::EnvironmentNotSet {
            variable: CONFIG_ENV_VAR.to_string(),
        })?;

    debug!("{}={}", CONFIG_ENV_VAR, selector);
    ConfigStore::load(&selector)
}

impl DefaultState {
    fn ensure_loaded(&mut self) -> Result<Arc<ConfigStore>> {
        if let Some(store) = &self.store {
            return Ok(Arc::clone(store));
        }

        match load_from_env() {
            Ok(store) => {
                info!("Loaded default config from {}", CONFIG_ENV_VAR);
                self.load_error = None;
                Ok(Arc::clone(self.store.insert(Arc::new(store))))
            }
            Err(e) => {
                error!("Error loading default config: {}", e);
                self.load_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

/// Run `f` against the default store, loading it first if needed
///
/// The global lock is released before `f` runs. If the default store is
/// replaced or cleared meanwhile, `f` keeps working on the store it was
/// given.
pub fn with_default<T, F>(f: F) -> Result<T>
where
    F: FnOnce(&ConfigStore) -> T,
{
    let store = state().ensure_loaded()?;
    Ok(f(&store))
}

/// Load the default store from `selector`, replacing any current store
pub fn init_default(selector: &str) -> Result<()> {
    let store = ConfigStore::load(selector)?;
    install_default(store);
    Ok(())
}

/// Install an already loaded store as the default, returning the previous one
pub fn install_default(store: ConfigStore) -> Option<Arc<ConfigStore>> {
    let mut state = state();
    state.load_error = None;
    state.store.replace(Arc::new(store))
}

/// Drop the default store; the next accessor call loads it again
pub fn clear_default() -> Option<Arc<ConfigStore>> {
    let mut state = state();
    state.load_error = None;
    state.store.take()
}

pub fn get_string(path: &str) -> Result<String> {
    with_default(|store| store.get_string(path))?
}

pub fn get_string_or(path: &str, default: impl Into<String>) -> Result<String> {
    let default = default.into();
    with_default(|store| store.get_string_or(path, default))?
}

pub fn get_int(path: &str) -> Result<i64> {
    with_default(|store| store.get_int(path))?
}

pub fn get_int_or(path: &str, default: i64) -> Result<i64> {
    with_default(|store| store.get_int_or(path, default))?
}

pub fn get_bool(path: &str) -> Result<bool> {
    with_default(|store| store.get_bool(path))?
}

pub fn get_bool_or(path: &str, default: bool) -> Result<bool> {
    with_default(|store| store.get_bool_or(path, default))?
}

/// Has a lookup on the default store failed, or did its last load fail?
///
/// Does not attempt a load.
pub fn was_error() -> bool {
    let state = state();
    match &state.store {
        Some(store) => store.was_error(),
        None => state.load_error.is_some(),
    }
}

/// Message for [`was_error`], or an empty string
pub fn error_message() -> String {
    let state = state();
    match &state.store {
        Some(store) => store.error_message(),
        None => state.load_error.clone().unwrap_or_default(),
    }
}

/// Clear the default store's error state and any remembered load failure
pub fn reset_error() {
    let mut state = state();
    state.load_error = None;
    if let Some(store) = &state.store {
        store.reset_error();
    }
}
