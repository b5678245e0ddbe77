use std::path::Path;

use anyhow::{Context, Result};

use crate::application::Pilot;
use crate::domain::render::render;

use super::read_config;

/// Print what `apply` would write, without touching anything.
pub fn execute(pilot: &Pilot, file: &Path) -> Result<()> {
    let config = read_config(file)?;
    config
        .validate()
        .with_context(|| format!("{} is not a valid upstream configuration", file.display()))?;
    print!("{}", render(&config, &pilot.paths().ca_bundle));
    Ok(())
}
