use std::time::Duration;

use serde::Deserialize;

use crate::commands::{CommandResult, StepError, EXIT_RUNTIME, EXIT_VERIFICATION};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct HealthCheck {
    status: String,
    detail: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    service: HealthCheck,
    database: HealthCheck,
}

/// Deploy verification: the service at `base_url` must report itself and its database ready.
pub fn run(base_url: &str) -> CommandResult {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "verify",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };
    runtime.block_on(check(base_url))
}

pub async fn check(base_url: &str) -> CommandResult {
    CommandResult::from_step("verify", check_health(base_url).await)
}

fn health_url(base_url: &str) -> String {
    format!("{}/api/health", base_url.trim_end_matches('/'))
}

async fn check_health(base_url: &str) -> Result<String, StepError> {
    let url = health_url(base_url);
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|error| ("runtime_init", error.to_string(), EXIT_RUNTIME))?;

    let response = client.get(&url).send().await.map_err(|error| {
        ("verification", format!("health endpoint unreachable at {url}: {error}"), EXIT_VERIFICATION)
    })?;
    let status = response.status();
    let body = response.json::<HealthResponse>().await.map_err(|error| {
        ("verification", format!("unexpected health payload ({status}): {error}"), EXIT_VERIFICATION)
    })?;

    if status.is_success() && body.status == "ready" {
        return Ok(format!(
            "service ready ({}); database ready ({})",
            body.service.detail, body.database.detail
        ));
    }
    Err((
        "verification",
        format!(
            "service reported {} ({status}): service {}, database {} ({})",
            body.status, body.service.status, body.database.status, body.database.detail
        ),
        EXIT_VERIFICATION,
    ))
}
