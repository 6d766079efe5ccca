//! The reflection context and its fluent builder.

use std::any::{Any, TypeId as RustTypeId};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::marker::PhantomData;

use bitflags::bitflags;
use tracing::{error, warn};

use engine_core::TypeId32;

use crate::any::MetaAny;
use crate::sequence::{SequenceVtable, sequence_vtable};
use crate::ui::UiElement;

bitflags! {
    /// Trait flags attached to a reflected type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TypeTraits: u32 {
        /// The type's fields may be edited through an inspector.
        const EDITABLE = 1 << 0;
    }
}

type Getter = Box<dyn Fn(&dyn Any) -> MetaAny<'static> + Send + Sync>;
type Setter = Box<dyn Fn(&mut dyn Any, MetaAny<'static>) -> bool + Send + Sync>;
type Invoker = Box<dyn Fn(MetaAny, &mut [MetaAny]) -> MetaAny<'static> + Send + Sync>;

/// A reflected data member: accessor pair plus optional UI metadata.
pub struct MetaData {
    name: &'static str,
    id: TypeId32,
    custom: Option<UiElement>,
    getter: Getter,
    setter: Setter,
}

impl MetaData {
    /// The field name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The field's stable id (hash of its name).
    #[must_use]
    pub fn id(&self) -> TypeId32 {
        self.id
    }

    /// The attached UI metadata, if any.
    #[must_use]
    pub fn custom(&self) -> Option<&UiElement> {
        self.custom.as_ref()
    }

    /// Read the field from `instance` as an owned copy.
    #[must_use]
    pub fn get(&self, instance: &dyn Any) -> MetaAny<'static> {
        (self.getter)(instance)
    }

    /// Write the field on `instance`. Returns `false` on a type
    /// mismatch of either the instance or the value.
    pub fn set(&self, instance: &mut dyn Any, value: MetaAny<'static>) -> bool {
        (self.setter)(instance, value)
    }
}

/// A reflected invokable member.
pub struct MetaFunc {
    name: &'static str,
    id: TypeId32,
    arity: usize,
    invoker: Invoker,
}

impl MetaFunc {
    /// The function name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The function's stable id (hash of its name).
    #[must_use]
    pub fn id(&self) -> TypeId32 {
        self.id
    }

    /// Number of arguments expected (excluding the instance).
    #[must_use]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Invoke with type-erased arguments.
    ///
    /// Arity mismatches are logged and yield
    /// [`MetaAny::Empty`]; argument type mismatches are handled by the
    /// registered invoker the same way.
    pub fn invoke(&self, instance: MetaAny, args: &mut [MetaAny]) -> MetaAny<'static> {
        if args.len() != self.arity {
            error!(
                function = self.name,
                expected = self.arity,
                got = args.len(),
                "reflected call with wrong argument count"
            );
            return MetaAny::Empty;
        }
        (self.invoker)(instance, args)
    }
}

/// A reflected type: name, stable id, flags, fields, and functions.
pub struct MetaType {
    name: &'static str,
    id: TypeId32,
    rust_id: RustTypeId,
    traits: TypeTraits,
    base: Option<TypeId32>,
    data: Vec<MetaData>,
    funcs: Vec<MetaFunc>,
}

impl MetaType {
    /// The registered type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The stable id (hash of the registered name).
    #[must_use]
    pub fn id(&self) -> TypeId32 {
        self.id
    }

    /// The trait flag bundle.
    #[must_use]
    pub fn traits(&self) -> TypeTraits {
        self.traits
    }

    /// The recorded base type, if any.
    #[must_use]
    pub fn base(&self) -> Option<TypeId32> {
        self.base
    }

    /// All reflected fields, in registration order.
    #[must_use]
    pub fn fields(&self) -> &[MetaData] {
        &self.data
    }

    /// Look up a field by id.
    #[must_use]
    pub fn data(&self, id: TypeId32) -> Option<&MetaData> {
        self.data.iter().find(|field| field.id == id)
    }

    /// Look up a field by name.
    #[must_use]
    pub fn data_by_name(&self, name: &str) -> Option<&MetaData> {
        self.data(TypeId32::from_name(name))
    }

    /// All reflected functions, in registration order.
    #[must_use]
    pub fn functions(&self) -> &[MetaFunc] {
        &self.funcs
    }

    /// Look up a function by id.
    #[must_use]
    pub fn func(&self, id: TypeId32) -> Option<&MetaFunc> {
        self.funcs.iter().find(|func| func.id == id)
    }

    /// Look up a function by name.
    #[must_use]
    pub fn func_by_name(&self, name: &str) -> Option<&MetaFunc> {
        self.func(TypeId32::from_name(name))
    }
}

fn default_type_compare(first: &MetaType, second: &MetaType) -> Ordering {
    first.id.cmp(&second.id)
}

/// Registry of reflected types, keyed by stable id.
#[derive(Default)]
pub struct ReflectContext {
    types: HashMap<TypeId32, MetaType>,
    by_rust: HashMap<RustTypeId, TypeId32>,
    sequences: HashMap<RustTypeId, SequenceVtable>,
}

impl ReflectContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or continue) reflecting type `T` under `name`.
    ///
    /// Reflecting the same name again returns a builder extending the
    /// existing entry, so registrars can contribute to one type from
    /// several places.
    pub fn reflect<T: Any>(&mut self, name: &'static str) -> Reflector<'_, T> {
        let id = TypeId32::from_name(name);
        let rust_id = RustTypeId::of::<T>();
        match self.types.get(&id) {
            Some(existing) if existing.rust_id != rust_id => {
                error!(name, "type name already registered for a different type");
            }
            Some(_) => {}
            None => {
                self.types.insert(
                    id,
                    MetaType {
                        name,
                        id,
                        rust_id,
                        traits: TypeTraits::empty(),
                        base: None,
                        data: Vec::new(),
                        funcs: Vec::new(),
                    },
                );
                self.by_rust.insert(rust_id, id);
            }
        }
        Reflector {
            context: self,
            type_id: id,
            _marker: PhantomData,
        }
    }

    /// Resolve a type by stable id.
    #[must_use]
    pub fn resolve(&self, id: TypeId32) -> Option<&MetaType> {
        self.types.get(&id)
    }

    /// Resolve a type by registered name.
    #[must_use]
    pub fn resolve_name(&self, name: &str) -> Option<&MetaType> {
        self.resolve(TypeId32::from_name(name))
    }

    /// Resolve the entry registered for Rust type `T`.
    #[must_use]
    pub fn resolve_of<T: Any>(&self) -> Option<&MetaType> {
        self.by_rust
            .get(&RustTypeId::of::<T>())
            .and_then(|id| self.types.get(id))
    }

    /// Number of registered types.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Every registered type, sorted by stable id.
    #[must_use]
    pub fn get_all_types(&self) -> Vec<&MetaType> {
        self.get_all_types_sorted(default_type_compare)
    }

    /// Every registered type, sorted with `compare`.
    #[must_use]
    pub fn get_all_types_sorted(
        &self,
        compare: impl Fn(&MetaType, &MetaType) -> Ordering,
    ) -> Vec<&MetaType> {
        let mut types: Vec<&MetaType> = self.types.values().collect();
        types.sort_by(|first, second| compare(first, second));
        types
    }

    /// Drop every registered type and sequence adapter.
    pub fn reset(&mut self) {
        self.types.clear();
        self.by_rust.clear();
        self.sequences.clear();
    }

    /// Drop one registered type.
    pub fn reset_type(&mut self, id: TypeId32) {
        if let Some(removed) = self.types.remove(&id) {
            self.by_rust.remove(&removed.rust_id);
        }
    }

    /// Register the sequence adapter for `Vec<T>`.
    ///
    /// Called automatically by
    /// [`Reflector::data_vec`]; needed directly only for sequences that
    /// appear in function signatures rather than fields.
    pub fn register_sequence<T: Any + Clone>(&mut self) {
        let (rust_id, vtable) = sequence_vtable::<T>();
        self.sequences.entry(rust_id).or_insert(vtable);
    }

    pub(crate) fn sequence_for(&self, rust_id: RustTypeId) -> Option<SequenceVtable> {
        self.sequences.get(&rust_id).copied()
    }
}

/// Fluent builder attaching members to one reflected type.
pub struct Reflector<'c, T: Any> {
    context: &'c mut ReflectContext,
    type_id: TypeId32,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any> Reflector<'_, T> {
    fn meta_mut(&mut self) -> &mut MetaType {
        self.context
            .types
            .get_mut(&self.type_id)
            .expect("type entry created by reflect()")
    }

    /// Register a field through an accessor pair.
    #[must_use]
    pub fn data<F: Any + Clone>(
        mut self,
        name: &'static str,
        get: fn(&T) -> F,
        set: fn(&mut T, F),
    ) -> Self {
        let field = MetaData {
            name,
            id: TypeId32::from_name(name),
            custom: None,
            getter: Box::new(move |instance| match instance.downcast_ref::<T>() {
                Some(target) => MetaAny::owned(get(target)),
                None => {
                    error!(field = name, "field read on a mismatched instance");
                    MetaAny::Empty
                }
            }),
            setter: Box::new(move |instance, value| {
                let Some(target) = instance.downcast_mut::<T>() else {
                    error!(field = name, "field write on a mismatched instance");
                    return false;
                };
                let Some(value) = value.take::<F>() else {
                    error!(field = name, "field write with a mismatched value");
                    return false;
                };
                set(target, value);
                true
            }),
        };
        self.meta_mut().data.push(field);
        self
    }

    /// Register a `Vec<F>` field and its sequence adapter.
    #[must_use]
    pub fn data_vec<F: Any + Clone>(
        self,
        name: &'static str,
        get: fn(&T) -> Vec<F>,
        set: fn(&mut T, Vec<F>),
    ) -> Self {
        self.context.register_sequence::<F>();
        self.data(name, get, set)
    }

    /// Register an invokable member.
    ///
    /// `arity` is the argument count excluding the instance; the
    /// invoker receives the instance and the argument slice and is
    /// responsible for its own argument casts.
    #[must_use]
    pub fn func(
        mut self,
        name: &'static str,
        arity: usize,
        invoker: impl Fn(MetaAny, &mut [MetaAny]) -> MetaAny<'static> + Send + Sync + 'static,
    ) -> Self {
        let func = MetaFunc {
            name,
            id: TypeId32::from_name(name),
            arity,
            invoker: Box::new(invoker),
        };
        self.meta_mut().funcs.push(func);
        self
    }

    /// Record `B` as the base type for upcasts.
    #[must_use]
    pub fn base<B: Any>(mut self) -> Self {
        let base = self.context.by_rust.get(&RustTypeId::of::<B>()).copied();
        if base.is_none() {
            warn!("base type must be reflected before the derived type");
        }
        self.meta_mut().base = base;
        self
    }

    /// Attach the trait flag bundle.
    #[must_use]
    pub fn traits(mut self, value: TypeTraits) -> Self {
        self.meta_mut().traits = value;
        self
    }

    /// Attach UI metadata to the most recently registered field.
    #[must_use]
    pub fn custom(mut self, element: UiElement) -> Self {
        match self.meta_mut().data.last_mut() {
            Some(field) => field.custom = Some(element),
            None => warn!("custom metadata attached before any field"),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::{EditTextElement, FloatElement};

    #[derive(Debug, Clone, PartialEq)]
    struct Transform {
        x: f32,
        y: f32,
        tags: Vec<u32>,
    }

    fn reflect_transform(context: &mut ReflectContext) {
        context
            .reflect::<Transform>("Transform")
            .traits(TypeTraits::EDITABLE)
            .data("x", |t: &Transform| t.x, |t, v| t.x = v)
            .custom(UiElement::Float(FloatElement::new(-10.0, 10.0, 0.1)))
            .data("y", |t: &Transform| t.y, |t, v| t.y = v)
            .data_vec("tags", |t: &Transform| t.tags.clone(), |t, v| t.tags = v);
    }

    #[test]
    fn test_field_roundtrip() {
        let mut context = ReflectContext::new();
        reflect_transform(&mut context);

        let mut value = Transform {
            x: 1.0,
            y: 2.0,
            tags: vec![],
        };
        let meta = context.resolve_name("Transform").unwrap();
        let field = meta.data_by_name("x").unwrap();

        assert_eq!(field.get(&value).try_cast::<f32>(), Some(&1.0));
        assert!(field.set(&mut value, MetaAny::owned(5.5f32)));
        assert_eq!(field.get(&value).try_cast::<f32>(), Some(&5.5));
        assert_eq!(value.x, 5.5);
    }

    #[test]
    fn test_field_set_rejects_wrong_type() {
        let mut context = ReflectContext::new();
        reflect_transform(&mut context);

        let mut value = Transform {
            x: 0.0,
            y: 0.0,
            tags: vec![],
        };
        let meta = context.resolve_name("Transform").unwrap();
        let field = meta.data_by_name("x").unwrap();
        assert!(!field.set(&mut value, MetaAny::owned("nope")));
        assert_eq!(value.x, 0.0);
    }

    #[test]
    fn test_custom_attaches_to_latest_field() {
        let mut context = ReflectContext::new();
        reflect_transform(&mut context);

        let meta = context.resolve_name("Transform").unwrap();
        assert!(matches!(
            meta.data_by_name("x").unwrap().custom(),
            Some(UiElement::Float(_))
        ));
        assert!(meta.data_by_name("y").unwrap().custom().is_none());
    }

    #[test]
    fn test_traits_flag() {
        let mut context = ReflectContext::new();
        reflect_transform(&mut context);
        let meta = context.resolve_name("Transform").unwrap();
        assert!(meta.traits().contains(TypeTraits::EDITABLE));
    }

    #[test]
    fn test_resolve_by_id_name_and_type() {
        let mut context = ReflectContext::new();
        reflect_transform(&mut context);

        let id = TypeId32::from_name("Transform");
        assert!(context.resolve(id).is_some());
        assert!(context.resolve_name("Transform").is_some());
        assert!(context.resolve_of::<Transform>().is_some());
        assert!(context.resolve_name("Missing").is_none());
    }

    #[test]
    fn test_func_invocation() {
        #[derive(Debug, Clone)]
        struct Counter {
            value: i32,
        }

        let mut context = ReflectContext::new();
        context.reflect::<Counter>("Counter").func(
            "AddValue",
            1,
            |mut instance, args| {
                let Some(counter) = instance.try_cast_mut::<Counter>() else {
                    return MetaAny::Empty;
                };
                let Some(amount) = args[0].try_cast::<i32>().copied() else {
                    return MetaAny::Empty;
                };
                counter.value += amount;
                MetaAny::owned(counter.value)
            },
        );

        let mut counter = Counter { value: 10 };
        let meta = context.resolve_name("Counter").unwrap();
        let func = meta.func_by_name("AddValue").unwrap();

        let result = func.invoke(MetaAny::from_mut(&mut counter), &mut [MetaAny::owned(5i32)]);
        assert_eq!(result.try_cast::<i32>(), Some(&15));
        assert_eq!(counter.value, 15);

        // Wrong arity is refused.
        let result = func.invoke(MetaAny::from_mut(&mut counter), &mut []);
        assert!(result.is_empty());
    }

    #[test]
    fn test_sequence_view_over_field() {
        let mut context = ReflectContext::new();
        reflect_transform(&mut context);

        let value = Transform {
            x: 0.0,
            y: 0.0,
            tags: vec![3, 5, 8],
        };
        let meta = context.resolve_name("Transform").unwrap();
        let mut tags = meta.data_by_name("tags").unwrap().get(&value);

        let mut view = tags.as_sequence(&context).expect("registered sequence");
        assert_eq!(view.len(), 3);
        assert_eq!(view.get(1).try_cast::<u32>(), Some(&5));
        assert!(view.set(1, MetaAny::owned(6u32)));
        assert_eq!(view.get(1).try_cast::<u32>(), Some(&6));
        assert!(view.push(MetaAny::owned(13u32)));
        assert_eq!(view.len(), 4);
    }

    #[test]
    fn test_non_sequence_has_no_view() {
        let context = ReflectContext::new();
        let mut value = MetaAny::owned(1u32);
        assert!(value.as_sequence(&context).is_none());
    }

    #[test]
    fn test_get_all_types_sorted_by_id() {
        #[derive(Clone)]
        struct A;
        #[derive(Clone)]
        struct B;

        let mut context = ReflectContext::new();
        let _ = context.reflect::<A>("Alpha");
        let _ = context.reflect::<B>("Beta");

        let types = context.get_all_types();
        assert_eq!(types.len(), 2);
        assert!(types[0].id() <= types[1].id());

        let by_name = context.get_all_types_sorted(|a, b| a.name().cmp(b.name()));
        assert_eq!(by_name[0].name(), "Alpha");
    }

    #[test]
    fn test_base_records_upcast() {
        #[derive(Clone)]
        struct Base;
        #[derive(Clone)]
        struct Derived;

        let mut context = ReflectContext::new();
        let _ = context.reflect::<Base>("Base");
        let _ = context.reflect::<Derived>("Derived").base::<Base>();

        let derived = context.resolve_name("Derived").unwrap();
        assert_eq!(derived.base(), Some(TypeId32::from_name("Base")));
    }

    #[test]
    fn test_reset_type() {
        let mut context = ReflectContext::new();
        reflect_transform(&mut context);
        context.reset_type(TypeId32::from_name("Transform"));
        assert!(context.resolve_name("Transform").is_none());
        assert!(context.resolve_of::<Transform>().is_none());
    }

    #[test]
    fn test_edit_text_defaults() {
        let element = EditTextElement::default();
        assert_eq!(element.max_length, 256);
        assert!(!element.multi_line);
    }
}
