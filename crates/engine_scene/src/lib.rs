//! # engine_scene
//!
//! The scene graph, derived from [`Hierarchy`] components stored in the
//! world. The components are authoritative; the [`SceneManager`]
//! observes their construct/update/destroy events and maintains the
//! caches behind the [`Scene`] query surface: root set, children map,
//! and a depth-annotated DFS of the whole tree.
//!
//! Structurally invalid hierarchies are reported and ignored: the
//! caches stay at the last known good state and the component is never
//! auto-repaired.

pub mod hierarchy;
pub mod manager;
pub mod scene;

pub use hierarchy::Hierarchy;
pub use manager::SceneManager;
pub use scene::Scene;
