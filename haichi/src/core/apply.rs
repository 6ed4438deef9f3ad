use std::fmt;

use thiserror::Error;

use super::signature::normalize_to_main;
use super::{DisplayMapping, LiveDisplay};
use crate::platform::{CommitMode, DisplayConfigurator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStage {
    Begin,
    ConfigureOrigin,
    Commit,
}

impl fmt::Display for ConfigStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigStage::Begin => write!(f, "begin"),
            ConfigStage::ConfigureOrigin => write!(f, "configure_origin"),
            ConfigStage::Commit => write!(f, "commit"),
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("display configuration {stage} failed (CGError {code})")]
pub struct ConfigError {
    pub stage: ConfigStage,
    pub code: i32,
}

/// An open configuration transaction. Cancelled on drop unless committed.
struct Transaction<'a, C: DisplayConfigurator> {
    configurator: &'a C,
    config: Option<C::Config>,
}

impl<'a, C: DisplayConfigurator> Transaction<'a, C> {
    fn begin(configurator: &'a C) -> Result<Self, ConfigError> {
        let config = configurator
            .begin_configuration()
            .map_err(|code| ConfigError {
                stage: ConfigStage::Begin,
                code,
            })?;
        Ok(Self {
            configurator,
            config: Some(config),
        })
    }

    fn stage_origins(&self, mapping: &[DisplayMapping]) -> Result<(), ConfigError> {
        let Some(config) = self.config.as_ref() else {
            return Ok(());
        };
        for m in mapping {
            tracing::debug!(
                "Display {} -> ({}, {}){}",
                m.display_id,
                m.target_x,
                m.target_y,
                if m.is_target_main { " [main]" } else { "" }
            );
            self.configurator
                .configure_origin(config, m.display_id, m.target_x, m.target_y)
                .map_err(|code| {
                    tracing::warn!(
                        "Failed to set origin of display {} to ({}, {}): {}",
                        m.display_id,
                        m.target_x,
                        m.target_y,
                        code
                    );
                    ConfigError {
                        stage: ConfigStage::ConfigureOrigin,
                        code,
                    }
                })?;
        }
        Ok(())
    }

    fn commit(mut self, mode: CommitMode) -> Result<(), ConfigError> {
        let Some(config) = self.config.take() else {
            return Ok(());
        };
        self.configurator
            .complete_configuration(config, mode)
            .map_err(|code| ConfigError {
                stage: ConfigStage::Commit,
                code,
            })
    }
}

impl<C: DisplayConfigurator> Drop for Transaction<'_, C> {
    fn drop(&mut self) {
        if let Some(config) = self.config.take() {
            tracing::debug!("Cancelling display configuration");
            self.configurator.cancel_configuration(config);
        }
    }
}

/// Apply every mapping entry in one transaction.
///
/// Tries a permanent commit first; if that fails, replays the origins in a
/// fresh transaction and commits for the session only. Returns the mode that
/// stuck.
pub fn apply_configuration<C: DisplayConfigurator>(
    configurator: &C,
    mapping: &[DisplayMapping],
) -> Result<CommitMode, ConfigError> {
    let tx = Transaction::begin(configurator)?;
    tx.stage_origins(mapping)?;
    match tx.commit(CommitMode::Permanent) {
        Ok(()) => {
            tracing::info!("Applied {} display origins permanently", mapping.len());
            return Ok(CommitMode::Permanent);
        }
        Err(e) => {
            tracing::warn!("Permanent commit failed, retrying for session: {}", e);
        }
    }

    let tx = Transaction::begin(configurator)?;
    tx.stage_origins(mapping)?;
    tx.commit(CommitMode::Session)?;
    tracing::info!("Applied {} display origins for session", mapping.len());
    Ok(CommitMode::Session)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tolerance {
    pub x: i32,
    pub y: i32,
}

/// Check re-read geometry against the mapping targets, relative to whichever
/// display is main now. Y is looser because the OS closes vertical gaps
/// between displays of different heights.
pub fn verify(displays: &[LiveDisplay], mapping: &[DisplayMapping], tolerance: Tolerance) -> bool {
    let Some(actual) = normalize_to_main(displays) else {
        tracing::warn!("Verification failed: no single main display after apply");
        return false;
    };

    let mut ok = true;
    for m in mapping {
        let Some(pos) = actual.get(&m.display_id) else {
            tracing::warn!("Verification failed: display {} disappeared", m.display_id);
            ok = false;
            continue;
        };
        let dx = (pos.x - m.target_x).abs();
        let dy = (pos.y - m.target_y).abs();
        if dx > tolerance.x || dy > tolerance.y {
            tracing::warn!(
                "Display {} is at ({}, {}), expected ({}, {})",
                m.display_id,
                pos.x,
                pos.y,
                m.target_x,
                m.target_y
            );
            ok = false;
        }
    }
    ok
}
