use anyhow::Result;

use crate::application::Pilot;

pub async fn execute(pilot: &Pilot) -> Result<()> {
    let control = pilot.service_control();

    match pilot.store().load() {
        Ok(config) => println!("Upstream mode: {}", config.mode),
        Err(e) => println!("Upstream mode: unreadable ({})", e),
    }

    println!("\nServices:");
    for state in control.service_states().await {
        println!("  {:<16} {}", state.service, state.state);
    }

    match control.resolver_status().await {
        Ok(result) if result.success() => {
            println!("\nResolver:");
            for line in result.stdout.lines() {
                println!("  {}", line);
            }
        }
        Ok(result) => println!("\nResolver: not running ({})", result.stderr_or_stdout()),
        Err(e) => println!("\nResolver: unknown ({:#})", e),
    }

    if let Some(pid) = pilot.lock().holder() {
        println!("\nApply in progress (PID: {})", pid);
    }

    match pilot.snapshots().list() {
        Ok(snapshots) => match snapshots.first() {
            Some(latest) => println!("\nSnapshots: {} (latest {})", snapshots.len(), latest.id),
            None => println!("\nSnapshots: none"),
        },
        Err(e) => println!("\nSnapshots: unreadable ({})", e),
    }
    Ok(())
}
