use anyhow::Result;

use crate::application::Pilot;
use crate::domain::ServiceName;

pub async fn execute(pilot: &Pilot, service: ServiceName) -> Result<()> {
    println!("Restarting {}...", service);
    pilot.service_control().restart(service).await?;
    println!("{} restarted.", service);
    Ok(())
}
