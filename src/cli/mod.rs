pub mod apply;
pub mod flush;
pub mod render;
pub mod restart;
pub mod rollback;
pub mod show;
pub mod snapshots;
pub mod stats;
pub mod status;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::UpstreamConfig;

/// Read an upstream configuration document. Validation is left to the
/// caller so that apply can report it like any other rejection.
pub(crate) fn read_config(path: &Path) -> Result<UpstreamConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
