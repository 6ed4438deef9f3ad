use serde::{Deserialize, Serialize};

use crate::{DisplayLayoutProfile, RestoreOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    // Profile operations
    Snapshot,
    Restore,
    ShowProfile,
    Forget,

    // Tracking / override
    ClearTracked,
    ClearOverride,

    // Settings
    SetAutoRestore { enabled: bool },

    // Queries
    Status,

    // Control
    Quit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Error { message: String },
    Profile { profile: Option<DisplayLayoutProfile> },
    Restore { outcome: RestoreOutcome },
    Status { status: StatusInfo },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub phase: String,
    pub signature: String,
    pub auto_restore: bool,
    pub observing: bool,
    pub has_default: bool,
    pub override_active: bool,
    pub tracking_positions: bool,
    pub displays: Vec<DisplayStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayStatus {
    pub id: u32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub is_main: bool,
    pub is_builtin: bool,
}
