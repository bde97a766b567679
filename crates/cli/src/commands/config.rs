use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use corner_core::config::{AppConfig, LoadOptions, LogFormat};
use toml::Value;

/// One reported key: its dotted path, the env vars that can set it (first
/// match wins), and how to render the effective value.
struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    render: fn(&AppConfig) -> String,
}

const FIELDS: &[Field] = &[
    Field {
        key: "database.url",
        env_keys: &["CORNER_DATABASE_URL"],
        render: |config| config.database.redacted_url(),
    },
    Field {
        key: "database.name",
        env_keys: &["CORNER_DATABASE_NAME"],
        render: |config| config.database.name.clone(),
    },
    Field {
        key: "database.max_connections",
        env_keys: &["CORNER_DATABASE_MAX_CONNECTIONS"],
        render: |config| config.database.max_connections.to_string(),
    },
    Field {
        key: "database.timeout_secs",
        env_keys: &["CORNER_DATABASE_TIMEOUT_SECS"],
        render: |config| config.database.timeout_secs.to_string(),
    },
    Field {
        key: "server.bind_address",
        env_keys: &["CORNER_SERVER_BIND_ADDRESS"],
        render: |config| config.server.bind_address.clone(),
    },
    Field {
        key: "server.port",
        env_keys: &["CORNER_SERVER_PORT"],
        render: |config| config.server.port.to_string(),
    },
    Field {
        key: "server.health_check_port",
        env_keys: &["CORNER_SERVER_HEALTH_CHECK_PORT"],
        render: |config| config.server.health_check_port.to_string(),
    },
    Field {
        key: "server.graceful_shutdown_secs",
        env_keys: &["CORNER_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        render: |config| config.server.graceful_shutdown_secs.to_string(),
    },
    Field {
        key: "server.static_dir",
        env_keys: &["CORNER_SERVER_STATIC_DIR"],
        render: |config| config.server.static_dir.display().to_string(),
    },
    Field {
        key: "server.public_url",
        env_keys: &["CORNER_SERVER_PUBLIC_URL"],
        render: |config| config.server.public_url.clone().unwrap_or_else(|| "<unset>".to_string()),
    },
    Field {
        key: "logging.level",
        env_keys: &["CORNER_LOGGING_LEVEL", "CORNER_LOG_LEVEL"],
        render: |config| config.logging.level.clone(),
    },
    Field {
        key: "logging.format",
        env_keys: &["CORNER_LOGGING_FORMAT", "CORNER_LOG_FORMAT"],
        render: |config| format_name(config.logging.format).to_string(),
    },
];

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(FIELDS.iter().map(|field| {
        render_line(
            field.key,
            &(field.render)(&config),
            field_source(
                field.key,
                field.env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        )
    }));
    lines.push(format!("- api base url = {}", config.server.api_base_url()));

    lines.join("\n")
}

fn format_name(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("corner.toml"), PathBuf::from("config/corner.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
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
