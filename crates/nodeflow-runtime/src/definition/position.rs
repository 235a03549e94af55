//! Canvas placement carried through from the graph editor.

use serde::{Deserialize, Serialize};

/// Position of a node on the editor canvas. Not used during execution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
}
