//! Logging initialization for the CLI.

/// Overrides the `--log-level` flag when set.
const LEVEL_ENV: &str = "STREAM_LOGGER_LOG_LEVEL";

/// Set when JSON lines should also go to ~/.stream-logger/logs/logger.jsonl.
const FILE_ENV: &str = "STREAM_LOGGER_LOG_FILE";

/// Initialize logging for the CLI.
///
/// Compact lines go to stderr. `RUST_LOG` takes precedence over both the
/// flag and `STREAM_LOGGER_LOG_LEVEL`.
pub fn init_logging(flag_level: &str) {
    let level = resolve_level(flag_level, std::env::var(LEVEL_ENV).ok());
    let file = std::env::var(FILE_ENV).ok().and_then(non_empty_env).is_some();

    if let Err(err) = observability::init_with_config(observability::LogConfig {
        service_name: "stream-logger".into(),
        default_level: level,
        file,
        also_stderr: true,
        ..Default::default()
    }) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn resolve_level(flag_level: &str, env_level: Option<String>) -> String {
    env_level
        .and_then(non_empty_env)
        .unwrap_or_else(|| flag_level.to_string())
}

fn non_empty_env(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
