pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::commands::cleanup::DEFAULT_KEEP;

#[derive(Debug, Parser)]
#[command(
    name = "rfq-tracker",
    about = "RFQ Tracker operator CLI",
    long_about = "Operate RFQ Tracker migrations, demo data, cleanup, config inspection, readiness checks and deploy verification.",
    after_help = "Examples:\n  rfq-tracker migrate\n  rfq-tracker seed\n  rfq-tracker cleanup --keep 2\n  rfq-tracker doctor --json\n  rfq-tracker verify --url http://localhost:8080"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset and verify it")]
    Seed,
    #[command(about = "Delete sales/engineer users and all but the oldest RFQs")]
    Cleanup {
        #[arg(long, default_value_t = DEFAULT_KEEP, help = "Number of oldest RFQs to keep")]
        keep: u32,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database connectivity and migration status")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Check a deployed service through its health endpoint")]
    Verify {
        #[arg(long, help = "Base URL of the deployed service, e.g. https://rfq.example.com")]
        url: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Cleanup { keep } => commands::cleanup::run(keep),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Verify { url } => commands::verify::run(&url),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
