//! Input abstraction layer.
//!
//! The host classifies raw gestures (taps, drags, pinches, scrolls) and
//! delivers them as `InputEvent`s in screen coordinates. The interaction
//! state machine converts to world space itself.

use kurbo::Point;

/// Modifier keys held during an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        alt: false,
        ctrl: false,
        meta: false,
    };

    pub const SHIFT: Self = Self {
        shift: true,
        ..Self::NONE
    };

    pub const ALT: Self = Self {
        alt: true,
        ..Self::NONE
    };
}

/// Keys the canvas reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    /// New sibling of the selected node.
    Enter,
    /// New child of the selected node.
    Tab,
    Delete,
    Backspace,
    Char(char),
}

/// A normalized input event.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown {
        x: f64,
        y: f64,
        modifiers: Modifiers,
    },
    PointerMove {
        x: f64,
        y: f64,
        modifiers: Modifiers,
    },
    PointerUp {
        x: f64,
        y: f64,
        modifiers: Modifiers,
    },
    /// A completed tap; `count` is 2 for a double tap.
    Tap { x: f64, y: f64, count: u8 },
    /// Scroll-wheel pan by a screen-space delta.
    Scroll { dx: f64, dy: f64 },
    /// Two-finger trackpad pan.
    TrackpadPan { dx: f64, dy: f64 },
    /// Pinch zoom around a screen anchor (1.0 = no change; >1 = zoom in).
    Magnify { factor: f64, x: f64, y: f64 },
    Key { key: Key, modifiers: Modifiers },
}

impl InputEvent {
    pub fn pointer_down(x: f64, y: f64) -> Self {
        Self::PointerDown {
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn pointer_move(x: f64, y: f64) -> Self {
        Self::PointerMove {
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn pointer_up(x: f64, y: f64) -> Self {
        Self::PointerUp {
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn key(key: Key) -> Self {
        Self::Key {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    /// Same event with `modifiers` held (pointer and key events only).
    #[must_use]
    pub fn with_modifiers(mut self, held: Modifiers) -> Self {
        match &mut self {
            Self::PointerDown { modifiers, .. }
            | Self::PointerMove { modifiers, .. }
            | Self::PointerUp { modifiers, .. }
            | Self::Key { modifiers, .. } => *modifiers = held,
            _ => {}
        }
        self
    }

    /// Screen position, if this event has one.
    pub fn position(&self) -> Option<Point> {
        match self {
            Self::PointerDown { x, y, .. }
            | Self::PointerMove { x, y, .. }
            | Self::PointerUp { x, y, .. }
            | Self::Tap { x, y, .. }
            | Self::Magnify { x, y, .. } => Some(Point::new(*x, *y)),
            _ => None,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match self {
            Self::PointerDown { modifiers, .. }
            | Self::PointerMove { modifiers, .. }
            | Self::PointerUp { modifiers, .. }
            | Self::Key { modifiers, .. } => *modifiers,
            _ => Modifiers::NONE,
        }
    }
}
