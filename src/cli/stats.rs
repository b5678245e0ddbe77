use anyhow::Result;

use crate::application::Pilot;
use crate::domain::ServfailRate;

pub async fn execute(pilot: &Pilot, all: bool) -> Result<()> {
    let stats = pilot.service_control().stats().await?;

    if stats.is_empty() {
        println!("Resolver returned no statistics.");
        return Ok(());
    }

    let rate = ServfailRate::cumulative(&stats);
    println!("Queries:  {}", rate.queries);
    println!("SERVFAIL: {} ({:.2}%)", rate.servfail, rate.percent());
    if let Some(hits) = stats.get("total.num.cachehits") {
        println!("Cache hits: {}", hits);
    }

    if all {
        println!();
        for (key, value) in stats.iter() {
            println!("{}={}", key, value);
        }
    }
    Ok(())
}
