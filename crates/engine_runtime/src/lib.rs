//! # engine_runtime
//!
//! The runtime shell around the core subsystems:
//!
//! - [`TickBus`] — a single ordered broadcast of `on_tick(world, dt)`
//!   per frame, with well-known [`TickOrder`] slots so independent
//!   subsystems place themselves without cross-reference.
//! - Input event shapes consumed from the window backend.
//! - [`EntityReaper`] — end-of-frame destruction of `DeadTag` entities.
//! - [`Engine`] — the explicit runtime struct owning the world, the
//!   buses, the service registry, and the type registry; no process
//!   globals.

pub mod engine;
pub mod input;
pub mod reaper;
pub mod tick;

pub use engine::{Engine, init_logging};
pub use input::{
    InputBusId, InputDevice, InputEventBus, InputEvents, InputMode, InputState, Key,
    KeyboardEvent, MouseButton, MouseButtonEvent, MouseCursorPosEvent, MouseScrollEvent,
    WindowCloseEvent, WindowResizeEvent, input_event_bus,
};
pub use reaper::EntityReaper;
pub use tick::{TickBus, TickEvents, TickOrder, tick_bus};
