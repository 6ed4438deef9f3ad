use std::fmt;

use serde::{Deserialize, Serialize};

/// Final result of a restore attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RestoreOutcome {
    Success,
    NoDefault,
    OverrideActive,
    MappingFailed,
    MirroringDetected,
    /// The saved profile does not have exactly one main display.
    InvalidProfile,
    ConfigurationFailed { stage: String, code: i32 },
    VerificationFailed,
}

impl RestoreOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RestoreOutcome::Success)
    }
}

impl fmt::Display for RestoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreOutcome::Success => write!(f, "Layout restored"),
            RestoreOutcome::NoDefault => write!(f, "No saved layout"),
            RestoreOutcome::OverrideActive => {
                write!(f, "Skipped: layout was changed manually")
            }
            RestoreOutcome::MappingFailed => {
                write!(f, "Could not find the saved main display")
            }
            RestoreOutcome::MirroringDetected => write!(f, "Skipped: mirroring is active"),
            RestoreOutcome::InvalidProfile => write!(f, "Saved layout is invalid"),
            RestoreOutcome::ConfigurationFailed { stage, code } => {
                write!(f, "Display configuration failed ({} error {})", stage, code)
            }
            RestoreOutcome::VerificationFailed => {
                write!(f, "Layout did not stick after retry")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreTrigger {
    Auto,
    Manual,
}
