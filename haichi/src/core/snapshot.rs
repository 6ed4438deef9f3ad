use std::time::{SystemTime, UNIX_EPOCH};

use haichi_ipc::{DisplayLayoutProfile, DisplayNode};
use thiserror::Error;

use super::signature::{normalize, signature};
use super::LiveDisplay;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("no displays found")]
    NoDisplays,
    #[error("no main display found")]
    NoMainDisplay,
    #[error("more than one display reports as main")]
    MultipleMainDisplays,
}

/// Capture the live arrangement as a profile. Pure; does not touch the OS.
pub fn snapshot(
    displays: &[LiveDisplay],
    timestamp: u64,
) -> Result<DisplayLayoutProfile, SnapshotError> {
    if displays.is_empty() {
        return Err(SnapshotError::NoDisplays);
    }

    let mut mains = displays.iter().filter(|d| d.is_main);
    let main = mains.next().ok_or(SnapshotError::NoMainDisplay)?;
    if mains.next().is_some() {
        return Err(SnapshotError::MultipleMainDisplays);
    }

    let positions = normalize(displays, main.origin());
    let nodes = displays
        .iter()
        .map(|d| {
            let origin = positions[&d.id];
            DisplayNode {
                is_main: d.is_main,
                origin_x: origin.x,
                origin_y: origin.y,
                pixel_width: d.bounds.width,
                pixel_height: d.bounds.height,
                is_builtin: d.is_builtin,
            }
        })
        .collect();

    Ok(DisplayLayoutProfile {
        signature: signature(displays),
        display_name: default_display_name(displays),
        created_at: timestamp,
        updated_at: timestamp,
        displays: nodes,
    })
}

pub fn default_display_name(displays: &[LiveDisplay]) -> String {
    let builtin = displays.iter().filter(|d| d.is_builtin).count();
    let external = displays.len() - builtin;

    match (builtin, external) {
        (0, 1) => "1 Display".to_string(),
        (0, n) => format!("{} Displays", n),
        (_, 0) => "Built-in Only".to_string(),
        (_, 1) => "Built-in + 1 External".to_string(),
        (_, n) => format!("Built-in + {} External", n),
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
