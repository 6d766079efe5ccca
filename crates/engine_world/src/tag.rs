//! Tag components — zero-sized markers for boolean membership.

use serde::{Deserialize, Serialize};

use crate::component::Component;

/// Marks an entity for destruction at the end of the frame.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeadTag;

impl Component for DeadTag {
    fn type_name() -> &'static str {
        "DeadTag"
    }
}

/// Marks an entity as active.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ActiveTag;

impl Component for ActiveTag {
    fn type_name() -> &'static str {
        "ActiveTag"
    }
}

/// Marks an entity as selected in the editor.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SelectTag;

impl Component for SelectTag {
    fn type_name() -> &'static str {
        "SelectTag"
    }
}

/// Marks an entity whose name is being edited.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Renaming;

impl Component for Renaming {
    fn type_name() -> &'static str {
        "Renaming"
    }
}
