//! Toolkit-neutral input events routed into the timeline by the UI layer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Button {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        shift: false,
        alt: false,
    };
    pub const ALT: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: true,
    };
}

/// Editing commands bound to keys by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    /// Move the playhead to the next widget start.
    NextWidget,
    /// Move the playhead to the previous widget start.
    PrevWidget,
    /// Toggle selection of the widget under the playhead.
    ToggleSelect,
    /// Delete every selected widget in the lane.
    DeleteSelected,
    /// Delete the widget under the mouse (and the rest of the selection with it).
    DeleteWidget,
    NudgeLeft,
    NudgeRight,
    PanLeft,
    PanRight,
    NudgeUp,
    NudgeDown,
}

impl Key {
    /// Keys whose auto-repeat is merged into one undo step until released.
    pub fn is_nudge(self) -> bool {
        matches!(
            self,
            Key::NudgeLeft
                | Key::NudgeRight
                | Key::PanLeft
                | Key::PanRight
                | Key::NudgeUp
                | Key::NudgeDown
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Push {
        x: i32,
        y: i32,
        button: Button,
        modifiers: Modifiers,
    },
    Drag {
        x: i32,
        y: i32,
        button: Button,
        modifiers: Modifiers,
    },
    Release {
        x: i32,
        y: i32,
    },
    Move {
        x: i32,
        y: i32,
    },
    /// The pointer entered the lane.
    Enter,
    Leave,
    Key(Key),
    KeyUp(Key),
}

impl Event {
    pub fn position(&self) -> Option<(i32, i32)> {
        match *self {
            Event::Push { x, y, .. }
            | Event::Drag { x, y, .. }
            | Event::Release { x, y }
            | Event::Move { x, y } => Some((x, y)),
            _ => None,
        }
    }
}
