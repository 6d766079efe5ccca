//! Deferred type registration.
//!
//! Subsystems hand the registry their registrar functions during
//! start-up; [`TypeRegistry::register_all`] runs them in insertion
//! order against the shared context, once, before the main loop.

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::context::{MetaType, ReflectContext};

/// A deferred registrar.
pub type RegisterFn = Box<dyn Fn(&mut ReflectContext) + Send + Sync>;

/// Collects registrars and owns the shared reflection context.
#[derive(Default)]
pub struct TypeRegistry {
    registrars: Vec<RegisterFn>,
    context: ReflectContext,
    registered: bool,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a registrar. Order of registration is preserved.
    pub fn register(&mut self, registrar: impl Fn(&mut ReflectContext) + Send + Sync + 'static) {
        self.registrars.push(Box::new(registrar));
    }

    /// Run every queued registrar against the shared context.
    ///
    /// Idempotent: a second call is refused so start-up glue cannot
    /// double-register members.
    pub fn register_all(&mut self) {
        if self.registered {
            warn!("register_all called twice, ignored");
            return;
        }
        for registrar in &self.registrars {
            registrar(&mut self.context);
        }
        self.registered = true;
        debug!(types = self.context.type_count(), "type registry populated");
    }

    /// The shared reflection context.
    #[must_use]
    pub fn context(&self) -> &ReflectContext {
        &self.context
    }

    /// Mutable access to the shared context, for tooling that reflects
    /// outside the start-up window.
    pub fn context_mut(&mut self) -> &mut ReflectContext {
        &mut self.context
    }

    /// Every registered type, sorted by stable id.
    #[must_use]
    pub fn get_all_types(&self) -> Vec<&MetaType> {
        self.context.get_all_types()
    }

    /// Every registered type, sorted with `compare`.
    #[must_use]
    pub fn get_all_types_sorted(
        &self,
        compare: impl Fn(&MetaType, &MetaType) -> Ordering,
    ) -> Vec<&MetaType> {
        self.context.get_all_types_sorted(compare)
    }
}
