use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const ENABLED_KEYS: [&str; 2] = ["RELAY_OBSERVABILITY_ENABLED", "RELAY_OBSERVABILITY"];
const LOG_LEVEL_KEY: &str = "RELAY_LOG_LEVEL";
const RUST_LOG_KEY: &str = "RUST_LOG";
const JSON_LOG_PATH_KEY: &str = "RELAY_JSON_LOG_PATH";
const DEFAULT_JSON_LOG_FILE: &str = "relay.logs.jsonl";
const DEFAULT_FILTER: &str = "info";

/// Parses the boolean spellings accepted by every `RELAY_*` flag.
pub fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Where relay logs are written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogOutput {
    Disabled,
    /// Compact lines on stderr. Stdout stays free for streamed text.
    Stderr,
    /// One JSON object per line, appended to `dir/file_name`.
    JsonFile { dir: PathBuf, file_name: String },
}

/// Logging settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservabilitySettings {
    pub output: LogOutput,
    /// `tracing_subscriber::EnvFilter` directive, already validated.
    pub filter: String,
}

impl ObservabilitySettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through `lookup` instead of the process environment.
    ///
    /// - `RELAY_OBSERVABILITY_ENABLED` / `RELAY_OBSERVABILITY`: enable flag, default on.
    ///   Unparseable values count as enabled.
    /// - `RELAY_LOG_LEVEL`, then `RUST_LOG`, then `info`. Invalid directives fall through.
    /// - `RELAY_JSON_LOG_PATH`: JSONL file; a path ending in a separator names
    ///   a directory and gets `relay.logs.jsonl`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = ENABLED_KEYS
            .iter()
            .find_map(|key| lookup(key))
            .is_none_or(|value| parse_bool_env(&value).unwrap_or(true));

        let filter = [LOG_LEVEL_KEY, RUST_LOG_KEY]
            .iter()
            .filter_map(|key| lookup(key))
            .find(|directive| EnvFilter::try_new(directive).is_ok())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());

        let output = match lookup(JSON_LOG_PATH_KEY) {
            _ if !enabled => LogOutput::Disabled,
            Some(path) if !path.trim().is_empty() => json_file_output(path.trim()),
            _ => LogOutput::Stderr,
        };
        Self { output, filter }
    }
}

fn json_file_output(path: &str) -> LogOutput {
    if path.ends_with(std::path::MAIN_SEPARATOR) || path.ends_with('/') {
        return LogOutput::JsonFile {
            dir: PathBuf::from(path),
            file_name: DEFAULT_JSON_LOG_FILE.to_string(),
        };
    }
    let path = Path::new(path);
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_JSON_LOG_FILE)
        .to_string();
    LogOutput::JsonFile { dir, file_name }
}

/// Installs relay logging once per process from the environment.
///
/// Both binaries call this right after loading `.env`.
pub fn init_observability() {
    init_observability_with(ObservabilitySettings::from_env());
}

/// Installs relay logging once per process. Later calls are no-ops, as is a
/// call made after another global subscriber was set.
pub fn init_observability_with(settings: ObservabilitySettings) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::new(&settings.filter);
        match settings.output {
            LogOutput::Disabled => {}
            LogOutput::JsonFile { dir, file_name } => {
                let _ = std::fs::create_dir_all(&dir);
                let writer = tracing_appender::rolling::never(dir, file_name);
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init();
            }
            LogOutput::Stderr => {
                let layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init();
            }
        }
    });
}
