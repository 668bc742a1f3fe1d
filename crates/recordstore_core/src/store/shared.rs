//! Process-wide shared store.
//!
//! # Invariants
//! - At most one shared store exists per process until reset.
//! - Initialization is serialized by one mutex.
//! - A shared store that resolves but fails to load aborts with a panic.

use log::{error, info};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::naming::{default_model_name, resolve_model_name};
use crate::registry::{DirectoryRegistry, ModelRegistry};
use crate::store::RecordStore;

type SharedSlot = Option<Arc<RecordStore>>;

static SHARED: Lazy<Mutex<SharedSlot>> = Lazy::new(|| Mutex::new(None));

fn lock_shared() -> MutexGuard<'static, SharedSlot> {
    // A panicking initializer leaves the slot empty, so the data stays valid.
    SHARED.lock().unwrap_or_else(PoisonError::into_inner)
}

fn install(
    slot: &mut SharedSlot,
    model_name: Option<&str>,
    registry: Option<Arc<dyn ModelRegistry>>,
) -> StoreResult<Arc<RecordStore>> {
    let registry = registry.unwrap_or_else(|| Arc::new(DirectoryRegistry::main()));
    let model = match model_name {
        Some(name) => resolve_model_name(name, registry.as_ref())
            .ok_or_else(|| StoreError::ModelNotFound(name.to_string()))?,
        None => default_model_name(registry.as_ref()).ok_or(StoreError::DefaultModelUndetermined)?,
    };

    let config = StoreConfig::from_env(model.as_str());
    let store = match RecordStore::open_resolved(model, registry.as_ref(), &config) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!("event=shared_init module=store status=error error_code=store_load_failed error={err}");
            panic!("shared record store failed to load: {err}");
        }
    };

    info!(
        "event=shared_init module=store status=ok model={}",
        store.model()
    );
    *slot = Some(Arc::clone(&store));
    Ok(store)
}

/// Initializes the shared store.
///
/// Without `model_name` the default model of the running program is used;
/// without `registry` models come from [`DirectoryRegistry::main`].
///
/// # Errors
/// - `AlreadyInitialized` once a shared store exists.
/// - `ModelNotFound` when `model_name` does not resolve.
/// - `DefaultModelUndetermined` when no default model resolves.
///
/// # Panics
/// When the resolved model or its store file cannot be loaded.
pub fn initialize_shared(
    model_name: Option<&str>,
    registry: Option<Arc<dyn ModelRegistry>>,
) -> StoreResult<()> {
    let mut slot = lock_shared();
    if slot.is_some() {
        return Err(StoreError::AlreadyInitialized);
    }
    install(&mut slot, model_name, registry).map(|_| ())
}

/// Returns the shared store, initializing it with defaults on first use.
///
/// # Panics
/// When default initialization fails.
pub fn shared() -> Arc<RecordStore> {
    let mut slot = lock_shared();
    if let Some(store) = slot.as_ref() {
        return Arc::clone(store);
    }
    match install(&mut slot, None, None) {
        Ok(store) => store,
        Err(err) => panic!("shared record store unavailable: {err}"),
    }
}

/// Drops the shared store so the next call initializes a fresh one.
#[doc(hidden)]
pub fn reset_shared_for_tests() {
    *lock_shared() = None;
}
