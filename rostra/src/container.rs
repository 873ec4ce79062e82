//! Minimal dependency-injection container.
//!
//! Maps a type to a lazily created singleton instance. Controllers and
//! class-referenced guards/middleware resolve through it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A type the container can construct.
///
/// Construction receives the container so dependencies can be resolved, and
/// is expected to be idempotent and side-effect-light.
pub trait Injectable: Send + Sync + 'static {
    /// Construct an instance, resolving dependencies through the container.
    fn construct(container: &Container) -> Self;
}

/// A registry mapping a type to its singleton instance, created lazily.
///
/// Resolution is get-or-create-once with a presence-check-then-set
/// discipline, not strictly atomic: two racing first resolutions may each
/// construct an instance, and the first write wins. This is acceptable
/// because construction is assumed idempotent.
#[derive(Default)]
pub struct Container {
    instances: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Container {
    /// An empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-built instance, replacing any existing one.
    pub fn register<T: Send + Sync + 'static>(&self, instance: Arc<T>) {
        self.instances
            .write()
            .expect("container lock poisoned")
            .insert(TypeId::of::<T>(), instance);
    }

    /// Whether an instance of `T` has been created or registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.instances
            .read()
            .expect("container lock poisoned")
            .contains_key(&TypeId::of::<T>())
    }

    /// The singleton for `T`, constructing it on first resolution.
    pub fn resolve<T: Injectable>(&self) -> Arc<T> {
        if let Some(existing) = self.lookup::<T>() {
            return existing;
        }
        let built = Arc::new(T::construct(self));
        let mut instances = self.instances.write().expect("container lock poisoned");
        let entry = instances
            .entry(TypeId::of::<T>())
            .or_insert_with(|| built.clone());
        entry
            .clone()
            .downcast::<T>()
            .expect("container entry keyed by TypeId has mismatched type")
    }

    fn lookup<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.instances
            .read()
            .expect("container lock poisoned")
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|any| any.downcast::<T>().ok())
    }
}
