//! Process-wide instance registry.
//!
//! One identity, one instance: the first `get_or_create` for an identity
//! runs the initializer and caches the handle; every later call returns
//! the cached handle without re-initializing. An explicit mutex-guarded
//! map rather than constructor interception, so the sharing is visible at
//! the call site.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

type InstanceMap = HashMap<String, Arc<dyn Any + Send + Sync>>;

static INSTANCES: OnceLock<Mutex<InstanceMap>> = OnceLock::new();

fn instances() -> &'static Mutex<InstanceMap> {
    INSTANCES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Get the instance registered under `identity`, constructing it with
/// `init` if this is the first call. At most one initialization happens
/// per identity; concurrent callers serialize on the registry lock.
///
/// Registering a different concrete type under an identity already in use
/// replaces the old entry; identities are expected to be unique per type.
pub fn get_or_create<T, F>(identity: &str, init: F) -> Arc<T>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> Arc<T>,
{
    let mut guard = instances()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(existing) = guard.get(identity) {
        match Arc::clone(existing).downcast::<T>() {
            Ok(typed) => return typed,
            Err(_) => {
                tracing::warn!(identity, "Registered instance has a different type; replacing");
            }
        }
    }

    let instance = init();
    guard.insert(identity.to_string(), instance.clone());
    tracing::debug!(identity, "Registered instance");
    instance
}

/// Drop the instance registered under `identity`, if any. The next
/// `get_or_create` for that identity re-initializes. Returns whether an
/// entry was removed.
pub fn remove(identity: &str) -> bool {
    instances()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .remove(identity)
        .is_some()
}
