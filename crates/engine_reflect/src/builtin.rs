//! Built-in reflection set.
//!
//! Registers the math value types and the core components every engine
//! build ships with. Feature crates queue their own registrars next to
//! this one.

use glam::{Quat, Vec2, Vec3, Vec4};

use engine_world::Name;

use crate::component_ops::component_operations;
use crate::context::{ReflectContext, TypeTraits};
use crate::registry::TypeRegistry;
use crate::ui::{EditTextElement, UiElement};

/// Queue the engine's built-in registrars on `registry`.
pub fn register_builtin_types(registry: &mut TypeRegistry) {
    registry.register(reflect_math);
    registry.register(reflect_core_components);
}

fn reflect_math(context: &mut ReflectContext) {
    let _ = context
        .reflect::<Vec2>("Vector2")
        .data("x", |v: &Vec2| v.x, |v, x| v.x = x)
        .data("y", |v: &Vec2| v.y, |v, y| v.y = y);

    let _ = context
        .reflect::<Vec3>("Vector3")
        .data("x", |v: &Vec3| v.x, |v, x| v.x = x)
        .data("y", |v: &Vec3| v.y, |v, y| v.y = y)
        .data("z", |v: &Vec3| v.z, |v, z| v.z = z);

    let _ = context
        .reflect::<Vec4>("Vector4")
        .data("x", |v: &Vec4| v.x, |v, x| v.x = x)
        .data("y", |v: &Vec4| v.y, |v, y| v.y = y)
        .data("z", |v: &Vec4| v.z, |v, z| v.z = z)
        .data("w", |v: &Vec4| v.w, |v, w| v.w = w);

    let _ = context
        .reflect::<Quat>("Quaternion")
        .data("x", |q: &Quat| q.x, |q, x| q.x = x)
        .data("y", |q: &Quat| q.y, |q, y| q.y = y)
        .data("z", |q: &Quat| q.z, |q, z| q.z = z)
        .data("w", |q: &Quat| q.w, |q, w| q.w = w);
}

fn reflect_core_components(context: &mut ReflectContext) {
    let _ = context
        .reflect::<Name>("Name")
        .traits(TypeTraits::EDITABLE)
        .data("name", |n: &Name| n.name.clone(), |n, v: String| n.name = v)
        .custom(UiElement::EditText(EditTextElement::default()));
    component_operations::<Name>(context);
}

#[cfg(test)]
mod tests {
    use engine_core::TypeId32;
    use engine_world::WorldContext;

    use super::*;
    use crate::any::MetaAny;

    fn populated_registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        register_builtin_types(&mut registry);
        registry.register_all();
        registry
    }

    #[test]
    fn test_math_types_registered() {
        let registry = populated_registry();
        for name in ["Vector2", "Vector3", "Vector4", "Quaternion"] {
            assert!(
                registry.context().resolve_name(name).is_some(),
                "missing {name}"
            );
        }
        let vec3 = registry.context().resolve_name("Vector3").unwrap();
        assert_eq!(vec3.fields().len(), 3);
    }

    #[test]
    fn test_vector_field_roundtrip() {
        let registry = populated_registry();
        let meta = registry.context().resolve_name("Vector3").unwrap();
        let mut value = Vec3::new(1.0, 2.0, 3.0);

        let field = meta.data_by_name("y").unwrap();
        assert_eq!(field.get(&value).try_cast::<f32>(), Some(&2.0));
        assert!(field.set(&mut value, MetaAny::owned(9.0f32)));
        assert_eq!(value.y, 9.0);
    }

    #[test]
    fn test_name_is_editable_with_text_widget() {
        let registry = populated_registry();
        let meta = registry.context().resolve_name("Name").unwrap();
        assert!(meta.traits().contains(TypeTraits::EDITABLE));
        assert!(matches!(
            meta.data_by_name("name").unwrap().custom(),
            Some(UiElement::EditText(_))
        ));
    }

    #[test]
    fn test_name_component_operations_registered() {
        let registry = populated_registry();
        let meta = registry.context().resolve_name("Name").unwrap();
        for function in [
            "HasComponent",
            "GetComponent",
            "AddComponent",
            "RemoveComponent",
            "ReplaceComponent",
        ] {
            assert!(meta.func_by_name(function).is_some(), "missing {function}");
        }
    }

    #[test]
    fn test_generic_inspector_flow() {
        // Resolve by id, add through reflection, read the field back:
        // the loop an inspector runs for every registered type.
        let registry = populated_registry();
        let mut world = WorldContext::new();
        let entity = world.create_entity();

        let meta = registry
            .context()
            .resolve(TypeId32::from_name("Name"))
            .unwrap();
        let add = meta.func(TypeId32::from_name("AddComponent")).unwrap();
        add.invoke(
            MetaAny::Empty,
            &mut [
                MetaAny::from_mut(&mut world),
                MetaAny::owned(entity),
                MetaAny::owned(Name::new("player")),
            ],
        );

        let get = meta.func(TypeId32::from_name("GetComponent")).unwrap();
        let value = get.invoke(
            MetaAny::Empty,
            &mut [MetaAny::from_mut(&mut world), MetaAny::owned(entity)],
        );
        let name = value.try_cast::<Name>().unwrap();
        let field = meta.data_by_name("name").unwrap();
        assert_eq!(field.get(name).try_cast::<String>().map(String::as_str), Some("player"));
    }
}
