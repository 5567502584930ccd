use rfq_tracker_db::{DemoDataset, SeedResult};

use crate::commands::{
    open_migrated, run_with_config, CommandResult, EXIT_EXECUTION, EXIT_VERIFICATION,
};

pub fn run() -> CommandResult {
    run_with_config("seed", |config| async move {
        let pool = open_migrated(&config).await?;

        let outcome = async {
            let seeded = DemoDataset::load(&pool)
                .await
                .map_err(|error| ("seed_execution", error.to_string(), EXIT_EXECUTION))?;
            let verification = DemoDataset::verify(&pool)
                .await
                .map_err(|error| ("seed_verification", error.to_string(), EXIT_VERIFICATION))?;

            if !verification.all_present {
                let failed = failed_checks(&verification.checks);
                return Err(("seed_verification", verification_message(&failed), EXIT_VERIFICATION));
            }
            Ok(summary(&seeded))
        }
        .await;

        pool.close().await;
        outcome
    })
}

fn failed_checks(checks: &[(&'static str, bool)]) -> Vec<&'static str> {
    checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect()
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed.join(", "))
    }
}

fn summary(seeded: &SeedResult) -> String {
    if seeded.already_seeded {
        return "demo dataset already present; nothing loaded".to_string();
    }
    format!(
        "demo dataset loaded: {} users, {} RFQs, {} quotations",
        seeded.users_created, seeded.rfqs_created, seeded.quotations_created
    )
}
