//! The `Hierarchy` component.

use serde::{Deserialize, Serialize};

use engine_world::{Component, Entity};

/// Linked-list encoding of an entity's place in the scene tree.
///
/// Records the parent, the first child, and the two siblings. All four
/// references are lookup keys, not ownership edges: each entity owns
/// only its own `Hierarchy`.
///
/// When attaching this component directly, the information must be
/// consistent: referenced entities must be in the scene, siblings must
/// share this entity's parent, and the sibling pointers must name an
/// insertion point in the existing child list. Inconsistent values are
/// reported to the scene and ignored; the component itself is not
/// modified or removed. Prefer the [`Scene`](crate::Scene) operations,
/// which manage the component automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hierarchy {
    /// The parent entity, or [`Entity::NULL`] for roots.
    pub parent: Entity,
    /// Head of the child list.
    pub first_child: Entity,
    /// The previous sibling in the parent's child list.
    pub prev_sibling: Entity,
    /// The next sibling in the parent's child list.
    pub next_sibling: Entity,
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self {
            parent: Entity::NULL,
            first_child: Entity::NULL,
            prev_sibling: Entity::NULL,
            next_sibling: Entity::NULL,
        }
    }
}

impl Component for Hierarchy {
    fn type_name() -> &'static str {
        "Hierarchy"
    }
}
