//! # engine_reflect
//!
//! A runtime type registry. Types register their data members,
//! invokable functions, trait flags, and per-field UI metadata through
//! a fluent builder; editors resolve types by stable id and drive them
//! generically, without per-type code: field reads and writes through
//! [`MetaAny`], method calls through [`MetaFunc`](context::MetaFunc).
//!
//! The context is mutated only while registrars run (before the main
//! loop, via [`TypeRegistry::register_all`]); reads during the loop are
//! lock-free.

pub mod any;
pub mod builtin;
pub mod component_ops;
pub mod context;
pub mod registry;
pub mod sequence;
pub mod ui;

pub use any::MetaAny;
pub use builtin::register_builtin_types;
pub use component_ops::component_operations;
pub use context::{MetaData, MetaFunc, MetaType, ReflectContext, Reflector, TypeTraits};
pub use registry::TypeRegistry;
pub use sequence::SequenceView;
pub use ui::{
    AssetElement, BoolElement, ColorElement, EditTextElement, EnumElement, FloatElement,
    FloatSliderElement, IntElement, IntSliderElement, ReadonlyTextElement, UiElement, Vec2Element,
    Vec3Element,
};
