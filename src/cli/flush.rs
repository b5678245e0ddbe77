use anyhow::{Context, Result, bail};

use crate::application::Pilot;
use crate::application::service_control::FlushTarget;
use crate::domain::DomainName;

pub async fn execute(pilot: &Pilot, zone: Option<String>, infra: bool) -> Result<()> {
    let target = match (zone, infra) {
        (Some(zone), false) => {
            let zone = DomainName::new(zone.as_str())
                .with_context(|| format!("'{}' is not a valid zone name", zone))?;
            FlushTarget::Zone(zone)
        }
        (None, true) => FlushTarget::Infra,
        _ => bail!("Specify exactly one of --zone ZONE or --infra"),
    };

    let result = pilot.service_control().flush(target).await?;
    let output = result.stdout.trim();
    if output.is_empty() {
        println!("Flushed.");
    } else {
        println!("{}", output);
    }
    Ok(())
}
