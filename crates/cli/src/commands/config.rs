use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rfq_tracker_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE, NESTED_CONFIG_FILE};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    render(&config, detect_config_path().as_deref())
}

pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);

    let entries: [(&str, String, &[&str]); 14] = [
        ("database.url", config.database.url.clone(), &["RFQ_TRACKER_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["RFQ_TRACKER_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["RFQ_TRACKER_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["RFQ_TRACKER_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["RFQ_TRACKER_SERVER_PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["RFQ_TRACKER_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "server.cors_origin",
            config.server.cors_origin.clone(),
            &["RFQ_TRACKER_SERVER_CORS_ORIGIN"],
        ),
        (
            "auth.api_token",
            redact_token(config.auth.api_token.expose_secret()),
            &["RFQ_TRACKER_AUTH_API_TOKEN"],
        ),
        (
            "rfq.default_currency",
            config.rfq.default_currency.clone(),
            &["RFQ_TRACKER_RFQ_DEFAULT_CURRENCY"],
        ),
        (
            "rfq.default_page_size",
            config.rfq.default_page_size.to_string(),
            &["RFQ_TRACKER_RFQ_DEFAULT_PAGE_SIZE"],
        ),
        (
            "rfq.max_page_size",
            config.rfq.max_page_size.to_string(),
            &["RFQ_TRACKER_RFQ_MAX_PAGE_SIZE"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["RFQ_TRACKER_LOGGING_LEVEL", "RFQ_TRACKER_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["RFQ_TRACKER_LOGGING_FORMAT", "RFQ_TRACKER_LOG_FORMAT"],
        ),
        (
            "config.file",
            config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<none>".to_string()),
            &[],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in entries {
        let source = field_source(key, env_keys, config_file_doc.as_ref(), config_file_path);
        lines.push(render_line(key, &value, source));
    }
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let length = token.trim().chars().count();
    if length == 0 {
        return "<empty>".to_string();
    }
    format!("<redacted ({length} chars)>")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rfq_tracker_core::config::AppConfig;

    use super::{contains_path, redact_token, render};

    #[test]
    fn token_is_never_rendered() {
        assert_eq!(redact_token("abcdefghijklmnop"), "<redacted (16 chars)>");
        assert_eq!(redact_token("   "), "<empty>");
    }

    #[test]
    fn file_keys_are_attributed_to_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rfq-tracker.toml");
        fs::write(&path, "[rfq]\ndefault_currency = \"USD\"\n").expect("write config");

        let mut config = AppConfig::default();
        config.auth.api_token = "file-token-abcdefgh".to_string().into();
        let rendered = render(&config, Some(&path));

        let currency = rendered
            .lines()
            .find(|line| line.starts_with("- rfq.default_currency"))
            .expect("currency line");
        assert!(currency.contains(&format!("file ({})", path.display())), "{currency}");
        assert!(!rendered.contains("file-token-abcdefgh"));
    }

    #[test]
    fn nested_paths_resolve_through_tables() {
        let doc: toml::Value = "[server]\nport = 9000\n".parse().expect("toml");
        assert!(contains_path(&doc, "server.port"));
        assert!(!contains_path(&doc, "server.bind_address"));
    }
}
