//! Per-field UI metadata.
//!
//! Inspectors read these descriptors through the reflected field's
//! `custom` slot to decide which widget to draw. The set of widgets is
//! closed, so the descriptors form a sum type rather than erased
//! objects.

/// Drag-edited float field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatElement {
    pub min: f32,
    pub max: f32,
    pub speed: f32,
    pub format: &'static str,
}

impl FloatElement {
    #[must_use]
    pub fn new(min: f32, max: f32, speed: f32) -> Self {
        Self {
            min,
            max,
            speed,
            format: "%.3f",
        }
    }
}

impl Default for FloatElement {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            speed: 0.01,
            format: "%.3f",
        }
    }
}

/// Slider-edited float field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatSliderElement {
    pub min: f32,
    pub max: f32,
    pub speed: f32,
    pub format: &'static str,
}

impl FloatSliderElement {
    #[must_use]
    pub fn new(min: f32, max: f32, speed: f32) -> Self {
        Self {
            min,
            max,
            speed,
            format: "%.3f",
        }
    }
}

impl Default for FloatSliderElement {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            speed: 0.01,
            format: "%.3f",
        }
    }
}

/// Drag-edited integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntElement {
    pub min: i32,
    pub max: i32,
    pub speed: i32,
}

impl IntElement {
    #[must_use]
    pub fn new(min: i32, max: i32, speed: i32) -> Self {
        Self { min, max, speed }
    }
}

impl Default for IntElement {
    fn default() -> Self {
        Self {
            min: 0,
            max: 10,
            speed: 1,
        }
    }
}

/// Slider-edited integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntSliderElement {
    pub min: i32,
    pub max: i32,
    pub speed: i32,
}

impl IntSliderElement {
    #[must_use]
    pub fn new(min: i32, max: i32, speed: i32) -> Self {
        Self { min, max, speed }
    }
}

impl Default for IntSliderElement {
    fn default() -> Self {
        Self {
            min: 0,
            max: 10,
            speed: 1,
        }
    }
}

/// Checkbox field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoolElement;

/// Editable text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditTextElement {
    pub max_length: usize,
    pub multi_line: bool,
}

impl EditTextElement {
    #[must_use]
    pub fn new(max_length: usize, multi_line: bool) -> Self {
        Self {
            max_length,
            multi_line,
        }
    }
}

impl Default for EditTextElement {
    fn default() -> Self {
        Self {
            max_length: 256,
            multi_line: false,
        }
    }
}

/// Read-only text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadonlyTextElement {
    pub max_length: usize,
    pub multi_line: bool,
}

impl ReadonlyTextElement {
    #[must_use]
    pub fn new(max_length: usize, multi_line: bool) -> Self {
        Self {
            max_length,
            multi_line,
        }
    }
}

impl Default for ReadonlyTextElement {
    fn default() -> Self {
        Self {
            max_length: 256,
            multi_line: false,
        }
    }
}

/// Two-component vector field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec2Element {
    pub speed: f32,
    pub format: &'static str,
}

impl Default for Vec2Element {
    fn default() -> Self {
        Self {
            speed: 0.1,
            format: "%.2f",
        }
    }
}

/// Three-component vector field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3Element {
    pub speed: f32,
    pub format: &'static str,
}

impl Default for Vec3Element {
    fn default() -> Self {
        Self {
            speed: 0.1,
            format: "%.2f",
        }
    }
}

/// Colour picker field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorElement;

/// Asset reference field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetElement;

/// Enumeration dropdown field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnumElement;

/// The closed set of field widgets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiElement {
    Float(FloatElement),
    FloatSlider(FloatSliderElement),
    Int(IntElement),
    IntSlider(IntSliderElement),
    Bool(BoolElement),
    EditText(EditTextElement),
    ReadonlyText(ReadonlyTextElement),
    Vec2(Vec2Element),
    Vec3(Vec3Element),
    Color(ColorElement),
    Asset(AssetElement),
    Enum(EnumElement),
}
