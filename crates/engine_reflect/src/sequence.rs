//! Sequence-container introspection.
//!
//! Any reflected field whose value is a `Vec<T>` with a registered
//! adapter is iterable through
//! [`MetaAny::as_sequence`](crate::MetaAny::as_sequence): element
//! access and mutation by index, without knowing `T` at the call site.

use std::any::{Any, TypeId};

use crate::any::MetaAny;
use crate::context::ReflectContext;

impl<'a> MetaAny<'a> {
    /// View the held value as a sequence container.
    ///
    /// Returns `None` unless the concrete value type has a registered
    /// adapter (see
    /// [`ReflectContext::register_sequence`]).
    #[must_use]
    pub fn as_sequence<'m>(&'m mut self, context: &ReflectContext) -> Option<SequenceView<'m, 'a>> {
        let vtable = context.sequence_for(self.value_type_id()?)?;
        Some(SequenceView {
            value: self,
            vtable,
        })
    }
}

/// Function table over one concrete `Vec<T>` type.
#[derive(Clone, Copy)]
pub(crate) struct SequenceVtable {
    pub(crate) len: fn(&dyn Any) -> usize,
    pub(crate) get: fn(&dyn Any, usize) -> MetaAny<'static>,
    pub(crate) set: fn(&mut dyn Any, usize, MetaAny<'static>) -> bool,
    pub(crate) push: fn(&mut dyn Any, MetaAny<'static>) -> bool,
}

pub(crate) fn sequence_vtable<T: Any + Clone>() -> (TypeId, SequenceVtable) {
    (
        TypeId::of::<Vec<T>>(),
        SequenceVtable {
            len: |container| {
                container.downcast_ref::<Vec<T>>().map_or(0, Vec::len)
            },
            get: |container, index| {
                container
                    .downcast_ref::<Vec<T>>()
                    .and_then(|values| values.get(index))
                    .map_or(MetaAny::Empty, |value| MetaAny::owned(value.clone()))
            },
            set: |container, index, value| {
                let Some(values) = container.downcast_mut::<Vec<T>>() else {
                    return false;
                };
                let Some(value) = value.take::<T>() else {
                    return false;
                };
                match values.get_mut(index) {
                    Some(slot) => {
                        *slot = value;
                        true
                    }
                    None => false,
                }
            },
            push: |container, value| {
                let Some(values) = container.downcast_mut::<Vec<T>>() else {
                    return false;
                };
                let Some(value) = value.take::<T>() else {
                    return false;
                };
                values.push(value);
                true
            },
        },
    )
}

/// A view over a type-erased sequence value.
pub struct SequenceView<'m, 'a> {
    pub(crate) value: &'m mut MetaAny<'a>,
    pub(crate) vtable: SequenceVtable,
}

impl SequenceView<'_, '_> {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self.borrow_container() {
            Some(container) => (self.vtable.len)(container),
            None => 0,
        }
    }

    /// Returns `true` when the sequence has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An owned copy of the element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> MetaAny<'static> {
        match self.borrow_container() {
            Some(container) => (self.vtable.get)(container, index),
            None => MetaAny::Empty,
        }
    }

    /// Overwrite the element at `index` with an owned value.
    pub fn set(&mut self, index: usize, value: MetaAny<'static>) -> bool {
        let set = self.vtable.set;
        match self.borrow_container_mut() {
            Some(container) => set(container, index, value),
            None => false,
        }
    }

    /// Append an owned value.
    pub fn push(&mut self, value: MetaAny<'static>) -> bool {
        let push = self.vtable.push;
        match self.borrow_container_mut() {
            Some(container) => push(container, value),
            None => false,
        }
    }

    fn borrow_container(&self) -> Option<&dyn Any> {
        match &*self.value {
            MetaAny::Empty => None,
            MetaAny::Owned(value) => Some(&**value),
            MetaAny::Ref(value) => Some(*value),
            MetaAny::Mut(value) => Some(&**value),
        }
    }

    fn borrow_container_mut(&mut self) -> Option<&mut dyn Any> {
        match &mut *self.value {
            MetaAny::Owned(value) => Some(&mut **value),
            MetaAny::Mut(value) => Some(&mut **value),
            MetaAny::Empty | MetaAny::Ref(_) => None,
        }
    }
}
