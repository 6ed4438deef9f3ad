use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use haichi_ipc::DisplayLayoutProfile;
use serde::{Deserialize, Serialize};

/// Owner of the saved default profile and the per-signature override markers.
pub trait ProfileStore {
    fn load_default(&self) -> Option<DisplayLayoutProfile>;
    fn has_override(&self, signature: &str) -> bool;
    fn set_override(&mut self, signature: &str);
    fn clear_override(&mut self, signature: &str);
    /// Also clears any override for the profile's signature.
    fn save_default(&mut self, profile: DisplayLayoutProfile);
    fn clear_default(&mut self);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    default: Option<DisplayLayoutProfile>,
    #[serde(default)]
    overrides: BTreeSet<String>,
}

impl StoreData {
    fn save_default(&mut self, profile: DisplayLayoutProfile) {
        self.overrides.remove(&profile.signature);
        self.default = Some(profile);
    }
}

/// Profile store backed by a single JSON file.
pub struct JsonProfileStore {
    path: PathBuf,
    data: StoreData,
}

impl JsonProfileStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read profiles {:?}", path))?;
            match serde_json::from_str(&contents) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable profiles {:?}: {}", path, e);
                    StoreData::default()
                }
            }
        } else {
            StoreData::default()
        };

        tracing::info!(
            "Profile store at {:?} (default: {}, overrides: {})",
            path,
            data.default.is_some(),
            data.overrides.len()
        );
        Ok(Self { path, data })
    }

    fn persist(&self) {
        if let Err(e) = self.write() {
            tracing::warn!("Failed to save profiles to {:?}: {:#}", self.path, e);
        }
    }

    fn write(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {:?}", dir))?;
        }
        let json = serde_json::to_string_pretty(&self.data)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("Failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to rename {:?}", tmp))?;
        Ok(())
    }
}

impl ProfileStore for JsonProfileStore {
    fn load_default(&self) -> Option<DisplayLayoutProfile> {
        self.data.default.clone()
    }

    fn has_override(&self, signature: &str) -> bool {
        self.data.overrides.contains(signature)
    }

    fn set_override(&mut self, signature: &str) {
        if self.data.overrides.insert(signature.to_string()) {
            tracing::info!("Override set for {}", signature);
            self.persist();
        }
    }

    fn clear_override(&mut self, signature: &str) {
        if self.data.overrides.remove(signature) {
            tracing::info!("Override cleared for {}", signature);
            self.persist();
        }
    }

    fn save_default(&mut self, profile: DisplayLayoutProfile) {
        tracing::info!(
            "Saving default profile '{}' ({})",
            profile.display_name,
            profile.signature
        );
        self.data.save_default(profile);
        self.persist();
    }

    fn clear_default(&mut self) {
        if self.data.default.take().is_some() {
            tracing::info!("Default profile cleared");
            self.persist();
        }
    }
}
