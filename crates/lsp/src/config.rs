use crate::core::diff::ComparisonPolicy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Extension of the descriptor file that marks a project root.
pub const DEFAULT_MARKER_EXTENSION: &str = "iml";

#[derive(Debug, Clone)]
pub struct Config {
    pub marker_extension: String,
    pub comparison_policy: ComparisonPolicy,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            marker_extension: DEFAULT_MARKER_EXTENSION.to_string(),
            comparison_policy: ComparisonPolicy::default(),
            log_file: None,
        }
    }

    pub fn update(&mut self, json: serde_json::Value) -> Result<()> {
        // Gracefully ignore anything that isn't a BridgeOptions object, e.g. "[]"
        // sent by clients that have no options configured.
        if let Ok(options) = serde_json::from_value::<BridgeOptions>(json) {
            if let Some(extension) = options.marker_extension {
                let extension = extension.trim_start_matches('.');
                if !extension.is_empty() {
                    self.marker_extension = extension.to_string();
                }
            }
            if let Some(policy) = options.comparison_policy {
                self.comparison_policy = policy;
            }
            if let Some(log_file) = options.log_file {
                self.log_file = Some(PathBuf::from(shellexpand::tilde(&log_file).as_ref()));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeOptions {
    pub marker_extension: Option<String>,
    pub comparison_policy: Option<ComparisonPolicy>,
    pub log_file: Option<String>,
}
