use rfq_tracker_db::cleanup;

use crate::commands::{open_migrated, run_with_config, CommandResult, EXIT_EXECUTION};

pub const DEFAULT_KEEP: u32 = 2;

/// Removes operational users and all but the `keep` oldest RFQs.
pub fn run(keep: u32) -> CommandResult {
    run_with_config("cleanup", |config| async move {
        let pool = open_migrated(&config).await?;
        let outcome = cleanup(&pool, keep)
            .await
            .map_err(|error| ("cleanup_execution", error.to_string(), EXIT_EXECUTION));
        pool.close().await;

        let report = outcome?;
        Ok(format!(
            "removed {} users and {} RFQs; kept {} RFQs",
            report.users_removed, report.rfqs_removed, report.rfqs_kept
        ))
    })
}
