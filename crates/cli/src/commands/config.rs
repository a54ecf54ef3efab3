use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use scholar_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        field_source(
            "database.url",
            Some("SCHOLAR_DATABASE_URL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        field_source(
            "database.max_connections",
            Some("SCHOLAR_DATABASE_MAX_CONNECTIONS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        field_source(
            "database.timeout_secs",
            Some("SCHOLAR_DATABASE_TIMEOUT_SECS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "mail.backend",
        &format!("{:?}", config.mail.backend),
        field_source(
            "mail.backend",
            Some("SCHOLAR_MAIL_BACKEND"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    let api_key = if config.mail.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "mail.api_key",
        api_key,
        field_source(
            "mail.api_key",
            Some("SCHOLAR_MAIL_API_KEY"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "mail.api_base_url",
        &config.mail.api_base_url,
        field_source(
            "mail.api_base_url",
            Some("SCHOLAR_MAIL_API_BASE_URL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "mail.smtp_host",
        &config.mail.smtp_host,
        field_source(
            "mail.smtp_host",
            Some("SCHOLAR_MAIL_SMTP_HOST"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "mail.smtp_port",
        &config.mail.smtp_port.to_string(),
        field_source(
            "mail.smtp_port",
            Some("SCHOLAR_MAIL_SMTP_PORT"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "mail.from_address",
        &config.mail.from_address,
        field_source(
            "mail.from_address",
            Some("SCHOLAR_MAIL_FROM_ADDRESS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "mail.admin_address",
        &config.mail.admin_address,
        field_source(
            "mail.admin_address",
            Some("SCHOLAR_MAIL_ADMIN_ADDRESS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "mail.client_dashboard_url",
        config.mail.client_dashboard_url.as_deref().unwrap_or("<unset>"),
        field_source(
            "mail.client_dashboard_url",
            Some("SCHOLAR_MAIL_CLIENT_DASHBOARD_URL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "mail.admin_dashboard_url",
        config.mail.admin_dashboard_url.as_deref().unwrap_or("<unset>"),
        field_source(
            "mail.admin_dashboard_url",
            Some("SCHOLAR_MAIL_ADMIN_DASHBOARD_URL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        field_source(
            "server.bind_address",
            Some("SCHOLAR_SERVER_BIND_ADDRESS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        field_source(
            "server.port",
            Some("SCHOLAR_SERVER_PORT"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "server.health_check_port",
        &config.server.health_check_port.to_string(),
        field_source(
            "server.health_check_port",
            Some("SCHOLAR_SERVER_HEALTH_CHECK_PORT"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "outbox.poll_interval_secs",
        &config.outbox.poll_interval_secs.to_string(),
        field_source(
            "outbox.poll_interval_secs",
            Some("SCHOLAR_OUTBOX_POLL_INTERVAL_SECS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "outbox.batch_size",
        &config.outbox.batch_size.to_string(),
        field_source(
            "outbox.batch_size",
            Some("SCHOLAR_OUTBOX_BATCH_SIZE"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "outbox.max_retries",
        &config.outbox.max_retries.to_string(),
        field_source(
            "outbox.max_retries",
            Some("SCHOLAR_OUTBOX_MAX_RETRIES"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "outbox.retry_base_secs",
        &config.outbox.retry_base_secs.to_string(),
        field_source(
            "outbox.retry_base_secs",
            Some("SCHOLAR_OUTBOX_RETRY_BASE_SECS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "outbox.claim_lease_secs",
        &config.outbox.claim_lease_secs.to_string(),
        field_source(
            "outbox.claim_lease_secs",
            Some("SCHOLAR_OUTBOX_CLAIM_LEASE_SECS"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        field_source(
            "logging.level",
            Some("SCHOLAR_LOGGING_LEVEL"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        field_source(
            "logging.format",
            Some("SCHOLAR_LOGGING_FORMAT"),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        ),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("scholar.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/scholar.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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
