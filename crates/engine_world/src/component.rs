//! The [`Component`] trait and component-set helpers.

use engine_core::TypeId32;

/// The contract for data stored in the world.
///
/// Components are plain values; the only requirement beyond thread
/// safety is a registered name, from which the stable
/// [`TypeId32`] is derived. The id keys component-event addresses and
/// reflection entries, so it must be unique per type within an engine.
///
/// # Examples
///
/// ```rust
/// use engine_world::Component;
///
/// #[derive(Debug, Clone)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
///
/// assert_eq!(Health::type_id(), engine_core::TypeId32::from_name("Health"));
/// ```
pub trait Component: Send + Sync + 'static {
    /// A human-readable, engine-unique name for this component type.
    fn type_name() -> &'static str;

    /// The stable id derived from [`type_name`](Self::type_name).
    #[must_use]
    fn type_id() -> TypeId32 {
        TypeId32::from_name(Self::type_name())
    }
}

/// A set of component types, used by `has_any` / `has_all` and bulk
/// removal. Implemented for single components and tuples up to four.
pub trait ComponentSet {
    /// The stable ids of every type in the set.
    fn type_ids() -> Vec<TypeId32>;
}

impl<A: Component> ComponentSet for A {
    fn type_ids() -> Vec<TypeId32> {
        vec![A::type_id()]
    }
}

impl<A: Component, B: Component> ComponentSet for (A, B) {
    fn type_ids() -> Vec<TypeId32> {
        vec![A::type_id(), B::type_id()]
    }
}

impl<A: Component, B: Component, C: Component> ComponentSet for (A, B, C) {
    fn type_ids() -> Vec<TypeId32> {
        vec![A::type_id(), B::type_id(), C::type_id()]
    }
}

impl<A: Component, B: Component, C: Component, D: Component> ComponentSet for (A, B, C, D) {
    fn type_ids() -> Vec<TypeId32> {
        vec![A::type_id(), B::type_id(), C::type_id(), D::type_id()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Health;
    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[derive(Debug, Clone)]
    struct Velocity;
    impl Component for Velocity {
        fn type_name() -> &'static str {
            "Velocity"
        }
    }

    #[test]
    fn test_type_id_is_stable() {
        assert_eq!(Health::type_id(), Health::type_id());
        assert_ne!(Health::type_id(), Velocity::type_id());
    }

    #[test]
    fn test_component_set_tuples() {
        assert_eq!(<Health as ComponentSet>::type_ids(), vec![Health::type_id()]);
        assert_eq!(
            <(Health, Velocity) as ComponentSet>::type_ids(),
            vec![Health::type_id(), Velocity::type_id()]
        );
    }
}
