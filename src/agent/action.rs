use std::fmt;

use serde::{Deserialize, Serialize};

use crate::world::Control;

/// The discrete action catalog. Indices are stable and stored in checkpoints by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Attack,
    Forward,
    Backward,
    Left,
    Right,
    Jump,
    Sprint,
    ForwardLeft,
    ForwardRight,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::Attack,
        Action::Forward,
        Action::Backward,
        Action::Left,
        Action::Right,
        Action::Jump,
        Action::Sprint,
        Action::ForwardLeft,
        Action::ForwardRight,
    ];

    pub fn from_index(index: usize) -> Option<Action> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Attack => "attack",
            Action::Forward => "forward",
            Action::Backward => "backward",
            Action::Left => "left",
            Action::Right => "right",
            Action::Jump => "jump",
            Action::Sprint => "sprint",
            Action::ForwardLeft => "forward_left",
            Action::ForwardRight => "forward_right",
        }
    }

    /// Catalog names in index order.
    pub fn catalog() -> Vec<String> {
        Self::ALL.iter().map(|a| a.name().to_string()).collect()
    }

    /// Controls held for this action's movement pulse; empty for `Attack`.
    pub fn controls(self) -> &'static [Control] {
        match self {
            Action::Attack => &[],
            Action::Forward => &[Control::Forward],
            Action::Backward => &[Control::Back],
            Action::Left => &[Control::Left],
            Action::Right => &[Control::Right],
            Action::Jump => &[Control::Jump],
            Action::Sprint => &[Control::Sprint],
            Action::ForwardLeft => &[Control::Forward, Control::Left],
            Action::ForwardRight => &[Control::Forward, Control::Right],
        }
    }

    /// Pulse length in milliseconds.
    pub fn pulse_ms(self) -> u64 {
        match self {
            Action::Attack => 0,
            Action::Jump => 100,
            Action::Sprint => 200,
            _ => 150,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
