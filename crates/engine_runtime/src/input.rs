//! Input event shapes and the input bus.
//!
//! The window backend captures raw input and publishes it here; the
//! core only defines the event shapes and the bus. Addresses are
//! consumer layers ordered front-to-back (editor UI first), and each
//! address holds at most one handler, so a layer can claim its slot
//! exclusively.

use serde::{Deserialize, Serialize};

use engine_bus::{BusOptions, EventBus};
use engine_world::WorldContext;

/// The device an input event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputDevice {
    Invalid,
    Mouse,
    Keyboard,
}

/// Press state of a key or button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputState {
    Press,
    Release,
    Repeat,
}

/// Modifier held during the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputMode {
    Invalid,
    Shift,
    Control,
    Alt,
}

/// Mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Keys the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Invalid,
    A,
    D,
    E,
    Q,
    R,
    S,
    W,
    Space,
}

/// A mouse button press or release.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseButtonEvent {
    pub button: MouseButton,
    pub state: InputState,
    pub mode: InputMode,
}

/// The cursor moved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseCursorPosEvent {
    pub x: f32,
    pub y: f32,
}

/// The scroll wheel moved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseScrollEvent {
    pub x_offset: f32,
    pub y_offset: f32,
}

/// A key press, release, or repeat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyboardEvent {
    pub key: Key,
    pub state: InputState,
    pub mode: InputMode,
}

/// The window was resized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowResizeEvent {
    pub width: f32,
    pub height: f32,
}

/// The window close button was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCloseEvent;

/// Input consumer layers, visited front-to-back on broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InputBusId {
    EditorUi,
    Editor,
    GameUi,
    Game,
}

/// The input interface. Handlers override only the events they care
/// about.
pub trait InputEvents: Send + Sync {
    fn on_mouse_button(&self, _world: &mut WorldContext, _event: MouseButtonEvent) {}

    fn on_mouse_cursor_pos(&self, _world: &mut WorldContext, _event: MouseCursorPosEvent) {}

    fn on_mouse_scroll(&self, _world: &mut WorldContext, _event: MouseScrollEvent) {}

    fn on_keyboard(&self, _world: &mut WorldContext, _event: KeyboardEvent) {}

    fn on_window_close(&self, _world: &mut WorldContext) {}

    fn on_window_resize(&self, _world: &mut WorldContext, _event: WindowResizeEvent) {}
}

/// Bus carrying [`InputEvents`], one handler per layer.
pub type InputEventBus = EventBus<dyn InputEvents, InputBusId>;

/// Build the input bus: ordered layer addresses, single handler each.
#[must_use]
pub fn input_event_bus() -> InputEventBus {
    EventBus::new(BusOptions::new("input").by_id_ordered().single_handler())
}
