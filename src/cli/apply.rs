use std::path::Path;

use anyhow::{Result, bail};

use crate::application::Pilot;
use crate::domain::{ApplyOptions, ApplyResult};

use super::{print_json, read_config, yes_no};

pub async fn execute(pilot: &Pilot, file: &Path, no_self_test: bool, json: bool) -> Result<()> {
    let candidate = read_config(file)?;
    let options = ApplyOptions {
        run_self_test: !no_self_test,
    };

    let result = pilot.orchestrator().apply(&candidate, options).await;

    if json {
        print_json(&result)?;
    } else {
        print_result(&result);
    }

    if !result.success {
        bail!("Apply did not succeed");
    }
    Ok(())
}

fn print_result(result: &ApplyResult) {
    if result.success {
        println!("Applied.");
    } else if result.rolled_back {
        println!("Apply failed; previous configuration restored.");
    } else if result.snapshot_id.is_some() {
        println!("Apply failed and rollback failed. Resolver state needs attention.");
    } else {
        println!("Apply refused; nothing was changed.");
    }

    if let Some(id) = &result.snapshot_id {
        println!("  Snapshot:   {}", id);
    }
    println!("  Validation: {}", yes_no(result.validation_passed));
    println!("  Reload:     {}", yes_no(result.reload_passed));
    if result.self_test_skipped {
        println!("  Self-test:  skipped");
    } else {
        println!("  Self-test:  {}", yes_no(result.self_test_passed));
    }
    if let Some(stage) = result.failed_stage {
        println!("  Failed at:  {}", stage);
    }
    if let Some(error) = &result.error {
        println!("  Error:      {}", error);
    }
    if !result.success && !result.rolled_back {
        if let Some(id) = &result.snapshot_id {
            println!("\nRetry the restore with: dnspilot rollback {}", id);
        }
    }
}
