use anyhow::{Context, Result};

use crate::application::Pilot;
use crate::domain::SnapshotId;

pub async fn execute(pilot: &Pilot, id: &str) -> Result<()> {
    let id = SnapshotId::parse(id).context("Use 'dnspilot snapshots' to list valid ids")?;

    println!("Restoring snapshot {}...", id);
    pilot.rollback().execute(&id).await?;
    println!("Snapshot restored and resolver reloaded.");
    Ok(())
}
