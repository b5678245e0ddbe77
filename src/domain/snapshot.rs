use serde::{Deserialize, Serialize};

use super::upstream::UpstreamConfig;
use super::value_objects::SnapshotId;

/// On-disk metadata record for one snapshot (`meta.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    pub id: SnapshotId,
    pub timestamp_iso: String,
    /// Whether the live resolver config existed when captured.
    pub resolver_config_present: bool,
    /// Whether the live structured config existed when captured.
    pub upstream_config_present: bool,
}

/// A point-in-time copy of both live config files.
///
/// Payloads are kept as the exact bytes read from disk so a restore is
/// byte-identical. `None` means the file did not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub timestamp_iso: String,
    pub rendered_config_text: Option<String>,
    pub upstream_config_text: Option<String>,
}

impl Snapshot {
    /// Structured config captured in this snapshot. A missing file means
    /// the system was still on its recursive default.
    pub fn upstream_config(&self) -> Result<UpstreamConfig, serde_json::Error> {
        match &self.upstream_config_text {
            Some(text) => serde_json::from_str(text),
            None => Ok(UpstreamConfig::default()),
        }
    }

    pub fn meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            id: self.id.clone(),
            timestamp_iso: self.timestamp_iso.clone(),
            resolver_config_present: self.rendered_config_text.is_some(),
            upstream_config_present: self.upstream_config_text.is_some(),
        }
    }
}
