use serde::{Deserialize, Serialize};

/// Keys handled while a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HotKey {
    /// Constrain to X (Shift: YZ plane)
    X,
    /// Constrain to Y (Shift: XZ plane)
    Y,
    /// Constrain to Z (Shift: XY plane)
    Z,
    /// Toggle snapping to origins only
    O,
    /// Toggle the target wireframe
    W,
}

impl HotKey {
    pub fn axis(&self) -> Option<char> {
        match self {
            HotKey::X => Some('X'),
            HotKey::Y => Some('Y'),
            HotKey::Z => Some('Z'),
            HotKey::O | HotKey::W => None,
        }
    }
}

/// Input delivered with a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// Timer tick, no user input
    Timer,
    MouseMove,
    /// Confirm button (picks the source, then confirms)
    Press,
    /// Cancel button
    Cancel,
    Key {
        key: HotKey,
        #[serde(default)]
        shift: bool,
    },
}
