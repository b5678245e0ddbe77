use anyhow::Result;

use crate::application::Pilot;

pub fn execute(pilot: &Pilot) -> Result<()> {
    let snapshots = pilot.snapshots().list()?;

    if snapshots.is_empty() {
        println!("No snapshots.");
        println!("Snapshots are taken automatically before every apply.");
        return Ok(());
    }

    println!("Snapshots (newest first):\n");
    for meta in snapshots {
        let mut contents = Vec::new();
        if meta.resolver_config_present {
            contents.push("resolver config");
        }
        if meta.upstream_config_present {
            contents.push("upstream config");
        }
        let contents = if contents.is_empty() {
            "empty (fresh system)".to_string()
        } else {
            contents.join(" + ")
        };
        println!("  {}  {}  {}", meta.id, meta.timestamp_iso, contents);
    }
    Ok(())
}
