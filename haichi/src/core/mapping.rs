use haichi_ipc::DisplayNode;
use thiserror::Error;

use super::LiveDisplay;
use crate::macos::DisplayId;

/// Where one live display should go for a restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMapping {
    pub display_id: DisplayId,
    pub target_x: i32,
    pub target_y: i32,
    pub is_target_main: bool,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("no live display could be assigned to the saved main display")]
pub struct MappingFailed;

/// Match saved nodes to live displays and compute target origins.
///
/// Exact-resolution matches are taken first, in saved order; remaining nodes
/// take the first unassigned live display in enumeration order. Nodes left
/// over when the live displays run out are dropped. The saved main must end up
/// assigned or the whole mapping fails.
pub fn map_displays(
    saved: &[DisplayNode],
    live: &[LiveDisplay],
) -> Result<Vec<DisplayMapping>, MappingFailed> {
    let assignments = assign(saved, live);

    let main_index = saved.iter().position(|n| n.is_main).ok_or(MappingFailed)?;
    let main_live_index = assignments[main_index].ok_or(MappingFailed)?;

    let main_saved = &saved[main_index];
    let main_live = &live[main_live_index];

    let mappings = saved
        .iter()
        .zip(&assignments)
        .filter_map(|(node, assigned)| {
            let display = &live[(*assigned)?];
            let target_x = scale_axis(
                node.origin_x,
                (main_live.bounds.width, main_saved.pixel_width),
                (display.bounds.width, node.pixel_width),
            );
            let target_y = scale_axis(
                node.origin_y,
                (main_live.bounds.height, main_saved.pixel_height),
                (display.bounds.height, node.pixel_height),
            );
            let display_id = display.id;
            tracing::debug!(
                "Mapped saved node ({}, {}) {}x{} -> display {} at ({}, {})",
                node.origin_x,
                node.origin_y,
                node.pixel_width,
                node.pixel_height,
                display_id,
                target_x,
                target_y
            );
            Some(DisplayMapping {
                display_id,
                target_x,
                target_y,
                is_target_main: node.is_main,
            })
        })
        .collect();

    Ok(mappings)
}

/// Index into `live` for each saved node, or None if it was dropped.
fn assign(saved: &[DisplayNode], live: &[LiveDisplay]) -> Vec<Option<usize>> {
    let mut taken = vec![false; live.len()];
    let mut assignments: Vec<Option<usize>> = vec![None; saved.len()];

    for (i, node) in saved.iter().enumerate() {
        let exact = live.iter().enumerate().position(|(j, d)| {
            !taken[j] && d.bounds.width == node.pixel_width && d.bounds.height == node.pixel_height
        });
        if let Some(j) = exact {
            taken[j] = true;
            assignments[i] = Some(j);
        }
    }

    for assignment in assignments.iter_mut().filter(|a| a.is_none()) {
        let Some(j) = taken.iter().position(|t| !t) else {
            break;
        };
        taken[j] = true;
        *assignment = Some(j);
    }

    assignments
}

/// Positive offsets (right of / below main) scale with the main display's
/// live/saved ratio; negative offsets scale with the node's own ratio.
fn scale_axis(origin: i32, main_sizes: (i32, i32), own_sizes: (i32, i32)) -> i32 {
    let (live, saved) = match origin {
        o if o > 0 => main_sizes,
        o if o < 0 => own_sizes,
        _ => return 0,
    };
    if saved == 0 {
        return origin;
    }
    (origin as i64 * live as i64 / saved as i64) as i32
}
