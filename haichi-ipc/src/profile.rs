use serde::{Deserialize, Serialize};

/// A saved display, positioned relative to the saved main display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayNode {
    pub is_main: bool,
    pub origin_x: i32,
    pub origin_y: i32,
    pub pixel_width: i32,
    pub pixel_height: i32,
    pub is_builtin: bool,
}

/// A saved arrangement. Always replaced as a whole, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayLayoutProfile {
    pub signature: String,
    pub display_name: String,
    /// Unix timestamp (seconds)
    pub created_at: u64,
    /// Unix timestamp (seconds)
    pub updated_at: u64,
    pub displays: Vec<DisplayNode>,
}

impl DisplayLayoutProfile {
    pub fn main_count(&self) -> usize {
        self.displays.iter().filter(|d| d.is_main).count()
    }

    /// Non-empty with exactly one main node.
    pub fn is_well_formed(&self) -> bool {
        !self.displays.is_empty() && self.main_count() == 1
    }

    pub fn main_node(&self) -> Option<&DisplayNode> {
        self.displays.iter().find(|d| d.is_main)
    }
}
