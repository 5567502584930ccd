use crate::commands::{open_migrated, run_with_config, CommandResult};

pub fn run() -> CommandResult {
    run_with_config("migrate", |config| async move {
        let pool = open_migrated(&config).await?;
        pool.close().await;
        Ok("applied pending migrations".to_string())
    })
}
