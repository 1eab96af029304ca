use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use custody_core::Principal;
use serde::{Deserialize, Serialize};

/// Settings for a replay session, read from a JSON file.
///
/// ```json
/// { "owner_label": "treasury", "failing_recipients": ["ab12.."], "start_time": 1000 }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CustodyConfig {
    #[serde(default)]
    pub owner: Option<Principal>,
    #[serde(default)]
    pub owner_label: Option<String>,
    /// Recipients whose transfers the simulated host refuses.
    #[serde(default)]
    pub failing_recipients: Vec<Principal>,
    /// Initial value of the logical clock.
    #[serde(default)]
    pub start_time: u64,
}

impl CustodyConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
        Self::from_json(&bytes).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Command-line values win over the file. An explicit owner replaces any
    /// label and vice versa.
    pub fn with_overrides(mut self, owner: Option<Principal>, owner_label: Option<String>) -> Self {
        if let Some(owner) = owner {
            self.owner = Some(owner);
            self.owner_label = None;
        } else if let Some(label) = owner_label {
            self.owner = None;
            self.owner_label = Some(label);
        }
        self
    }

    pub fn resolve_owner(&self) -> Result<Principal> {
        match (&self.owner, &self.owner_label) {
            (Some(owner), _) => Ok(*owner),
            (None, Some(label)) => Ok(Principal::from_label(label)),
            (None, None) => bail!(
                "no owner configured: pass --owner or --owner-label, or set one in the config file"
            ),
        }
    }
}
