use anyhow::Result;

use crate::application::Pilot;
use crate::infrastructure::upstream_store::to_json;

/// Print the persisted upstream configuration.
pub fn execute(pilot: &Pilot) -> Result<()> {
    let store = pilot.store();
    if store.load_text()?.is_none() {
        println!("No configuration applied yet (recursive mode).");
        println!("Stored at: {}", store.path().display());
        return Ok(());
    }

    let config = store.load()?;
    print!("{}", to_json(&config)?);
    Ok(())
}
