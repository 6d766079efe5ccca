//! Reflected component operations.
//!
//! [`component_operations`] registers five functions on a component
//! type — `HasComponent`, `GetComponent`, `AddComponent`,
//! `RemoveComponent`, `ReplaceComponent` — each forwarding to the
//! entity store. Editors iterate all registered types and drive these
//! through reflection to build generic inspectors without per-type
//! code.
//!
//! Argument convention (the instance slot is unused):
//!
//! | function | args |
//! |---|---|
//! | `HasComponent`     | `&mut world`, `entity` |
//! | `GetComponent`     | `&mut world`, `entity` |
//! | `AddComponent`     | `&mut world`, `entity`, value |
//! | `RemoveComponent`  | `&mut world`, `entity` |
//! | `ReplaceComponent` | `&mut world`, `entity`, value |

use std::any::Any;

use tracing::error;

use engine_world::{Component, Entity, WorldContext};

use crate::any::MetaAny;
use crate::context::ReflectContext;

fn world_arg<'w>(args: &'w mut [MetaAny], function: &'static str) -> Option<&'w mut WorldContext> {
    match args[0].try_cast_mut::<WorldContext>() {
        Some(world) => Some(world),
        None => {
            error!(function, "first argument must be the world");
            None
        }
    }
}

fn entity_arg(args: &[MetaAny], function: &'static str) -> Option<Entity> {
    match args[1].try_cast::<Entity>().copied() {
        Some(entity) => Some(entity),
        None => {
            error!(function, "second argument must be an entity");
            None
        }
    }
}

fn value_arg<T: Component>(args: &mut [MetaAny], function: &'static str) -> Option<T> {
    match std::mem::take(&mut args[2]).take::<T>() {
        Some(value) => Some(value),
        None => {
            error!(function, component = T::type_name(), "third argument must be the component value");
            None
        }
    }
}

/// Register the five entity-store forwarders on component type `T`.
///
/// `T` must already be (or simultaneously become) reflected under its
/// component name; the functions are appended to that entry.
pub fn component_operations<T: Component + Clone + Any>(context: &mut ReflectContext) {
    let _ = context
        .reflect::<T>(T::type_name())
        .func("HasComponent", 2, |_, args| {
            let Some(entity) = entity_arg(args, "HasComponent") else {
                return MetaAny::Empty;
            };
            let Some(world) = world_arg(args, "HasComponent") else {
                return MetaAny::Empty;
            };
            MetaAny::owned(world.has::<T>(entity))
        })
        .func("GetComponent", 2, |_, args| {
            let Some(entity) = entity_arg(args, "GetComponent") else {
                return MetaAny::Empty;
            };
            let Some(world) = world_arg(args, "GetComponent") else {
                return MetaAny::Empty;
            };
            match world.get::<T>(entity) {
                Some(value) => MetaAny::owned(value.clone()),
                None => MetaAny::Empty,
            }
        })
        .func("AddComponent", 3, |_, args| {
            let Some(entity) = entity_arg(args, "AddComponent") else {
                return MetaAny::Empty;
            };
            let Some(value) = value_arg::<T>(args, "AddComponent") else {
                return MetaAny::Empty;
            };
            let Some(world) = world_arg(args, "AddComponent") else {
                return MetaAny::Empty;
            };
            MetaAny::owned(world.add_or_replace(entity, value).is_ok())
        })
        .func("RemoveComponent", 2, |_, args| {
            let Some(entity) = entity_arg(args, "RemoveComponent") else {
                return MetaAny::Empty;
            };
            let Some(world) = world_arg(args, "RemoveComponent") else {
                return MetaAny::Empty;
            };
            MetaAny::owned(world.remove::<T>(entity).is_ok())
        })
        .func("ReplaceComponent", 3, |_, args| {
            let Some(entity) = entity_arg(args, "ReplaceComponent") else {
                return MetaAny::Empty;
            };
            let Some(value) = value_arg::<T>(args, "ReplaceComponent") else {
                return MetaAny::Empty;
            };
            let Some(world) = world_arg(args, "ReplaceComponent") else {
                return MetaAny::Empty;
            };
            MetaAny::owned(world.replace(entity, value).is_ok())
        });
}

#[cfg(test)]
mod tests {
    use engine_core::TypeId32;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
        z: f32,
    }

    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    fn reflect_position(context: &mut ReflectContext) {
        let _ = context
            .reflect::<Position>("Position")
            .data("x", |p: &Position| p.x, |p, v| p.x = v)
            .data("y", |p: &Position| p.y, |p, v| p.y = v)
            .data("z", |p: &Position| p.z, |p, v| p.z = v);
        component_operations::<Position>(context);
    }

    #[test]
    fn test_add_component_through_reflection() {
        let mut context = ReflectContext::new();
        reflect_position(&mut context);

        let mut world = WorldContext::new();
        let entity = world.create_entity();

        let meta = context.resolve(TypeId32::from_name("Position")).unwrap();
        let add = meta.func(TypeId32::from_name("AddComponent")).unwrap();
        let result = add.invoke(
            MetaAny::Empty,
            &mut [
                MetaAny::from_mut(&mut world),
                MetaAny::owned(entity),
                MetaAny::owned(Position { x: 1.0, y: 1.0, z: 1.0 }),
            ],
        );

        assert_eq!(result.try_cast::<bool>(), Some(&true));
        assert_eq!(
            world.get::<Position>(entity),
            Some(&Position { x: 1.0, y: 1.0, z: 1.0 })
        );
    }

    #[test]
    fn test_has_get_remove_through_reflection() {
        let mut context = ReflectContext::new();
        reflect_position(&mut context);

        let mut world = WorldContext::new();
        let entity = world.create_entity();
        world
            .add(entity, Position { x: 2.0, y: 0.0, z: 0.0 })
            .unwrap();

        let meta = context.resolve_name("Position").unwrap();

        let has = meta.func_by_name("HasComponent").unwrap();
        let result = has.invoke(
            MetaAny::Empty,
            &mut [MetaAny::from_mut(&mut world), MetaAny::owned(entity)],
        );
        assert_eq!(result.try_cast::<bool>(), Some(&true));

        let get = meta.func_by_name("GetComponent").unwrap();
        let result = get.invoke(
            MetaAny::Empty,
            &mut [MetaAny::from_mut(&mut world), MetaAny::owned(entity)],
        );
        assert_eq!(result.try_cast::<Position>().map(|p| p.x), Some(2.0));

        let remove = meta.func_by_name("RemoveComponent").unwrap();
        let result = remove.invoke(
            MetaAny::Empty,
            &mut [MetaAny::from_mut(&mut world), MetaAny::owned(entity)],
        );
        assert_eq!(result.try_cast::<bool>(), Some(&true));
        assert!(!world.has::<Position>(entity));
    }

    #[test]
    fn test_replace_through_reflection() {
        let mut context = ReflectContext::new();
        reflect_position(&mut context);

        let mut world = WorldContext::new();
        let entity = world.create_entity();
        world
            .add(entity, Position { x: 0.0, y: 0.0, z: 0.0 })
            .unwrap();

        let meta = context.resolve_name("Position").unwrap();
        let replace = meta.func_by_name("ReplaceComponent").unwrap();
        let result = replace.invoke(
            MetaAny::Empty,
            &mut [
                MetaAny::from_mut(&mut world),
                MetaAny::owned(entity),
                MetaAny::owned(Position { x: 3.0, y: 0.0, z: 0.0 }),
            ],
        );
        assert_eq!(result.try_cast::<bool>(), Some(&true));
        assert_eq!(world.get::<Position>(entity).map(|p| p.x), Some(3.0));
    }

    #[test]
    fn test_bad_arguments_yield_empty() {
        let mut context = ReflectContext::new();
        reflect_position(&mut context);

        let meta = context.resolve_name("Position").unwrap();
        let has = meta.func_by_name("HasComponent").unwrap();

        // Not a world in slot 0.
        let result = has.invoke(
            MetaAny::Empty,
            &mut [MetaAny::owned(1u32), MetaAny::owned(Entity::NULL)],
        );
        assert!(result.is_empty());
    }
}
