//! Service registry — per-interface singleton slots.
//!
//! A subsystem that other subsystems need to call (a scene, a log sink,
//! an asset loader) publishes itself under its interface type. Lookup
//! is by interface, not by concrete type, so consumers stay decoupled
//! from the implementation:
//!
//! ```rust
//! use std::sync::Arc;
//! use engine_core::{ServiceHandle, ServiceRegistry};
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! struct FixedClock;
//! impl Clock for FixedClock {
//!     fn now(&self) -> u64 { 42 }
//! }
//!
//! let registry = Arc::new(ServiceRegistry::new());
//! let clock: Arc<dyn Clock> = Arc::new(FixedClock);
//! let _binding = ServiceHandle::bind(registry.clone(), clock).unwrap();
//!
//! if let Some(clock) = registry.get::<dyn Clock>() {
//!     assert_eq!(clock.now(), 42);
//! }
//! ```
//!
//! The registry does not manage the lifetime of the published instance
//! beyond holding one `Arc` clone; callers must treat [`ServiceRegistry::get`]
//! returning `None` as "service not available" and degrade gracefully.

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

/// Registry of published services, keyed by interface type.
///
/// A slot holds at most one instance. The first binder wins;
/// re-registration while occupied is refused. Reads are concurrent,
/// register/unregister take exclusive access to the slot.
#[derive(Default)]
pub struct ServiceRegistry {
    slots: DashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Publish `instance` under interface `I`.
    ///
    /// Returns `false` (without overwriting) if the slot is already
    /// occupied.
    pub fn register<I>(&self, instance: Arc<I>) -> bool
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let key = TypeId::of::<I>();
        if self.slots.contains_key(&key) {
            warn!(
                interface = std::any::type_name::<I>(),
                "service slot already occupied, registration refused"
            );
            return false;
        }
        self.slots.insert(key, Box::new(instance));
        debug!(interface = std::any::type_name::<I>(), "service registered");
        true
    }

    /// Remove the binding for interface `I`.
    ///
    /// Returns `false` unless `instance` is the currently bound pointer.
    pub fn unregister<I>(&self, instance: &Arc<I>) -> bool
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let key = TypeId::of::<I>();
        let matches = self
            .slots
            .get(&key)
            .and_then(|entry| entry.downcast_ref::<Arc<I>>().map(|bound| Arc::ptr_eq(bound, instance)))
            .unwrap_or(false);
        if !matches {
            warn!(
                interface = std::any::type_name::<I>(),
                "unregister refused: instance is not the bound service"
            );
            return false;
        }
        self.slots.remove(&key);
        debug!(interface = std::any::type_name::<I>(), "service unregistered");
        true
    }

    /// Look up the service bound to interface `I`.
    #[must_use]
    pub fn get<I>(&self) -> Option<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.slots
            .get(&TypeId::of::<I>())
            .and_then(|entry| entry.downcast_ref::<Arc<I>>().cloned())
    }

    /// Returns `true` if interface `I` currently has a binding.
    #[must_use]
    pub fn contains<I>(&self) -> bool
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.slots.contains_key(&TypeId::of::<I>())
    }
}

/// RAII service binding: registers on construction, unregisters on drop.
///
/// This is the canonical way for a subsystem to publish itself for the
/// duration of its own lifetime.
pub struct ServiceHandle<I>
where
    I: ?Sized + Send + Sync + 'static,
{
    registry: Arc<ServiceRegistry>,
    instance: Arc<I>,
}

impl<I> ServiceHandle<I>
where
    I: ?Sized + Send + Sync + 'static,
{
    /// Bind `instance` under interface `I`.
    ///
    /// Returns `None` if the slot is already occupied.
    #[must_use]
    pub fn bind(registry: Arc<ServiceRegistry>, instance: Arc<I>) -> Option<Self> {
        if !registry.register(instance.clone()) {
            return None;
        }
        Some(Self { registry, instance })
    }

    /// The bound instance.
    #[must_use]
    pub fn instance(&self) -> &Arc<I> {
        &self.instance
    }
}

impl<I> Drop for ServiceHandle<I>
where
    I: ?Sized + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.registry.unregister::<I>(&self.instance);
    }
}
