use serde::Serialize;
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_PATH: &str = "/tmp/askchat.log";
const DEBUG_PAYLOAD_ENV: &str = "ASK_DEBUG_PAYLOAD";
const LOG_FILTER_ENV: &str = "ASK_LOG";
const DEFAULT_LOG_FILTER: &str = "info";

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn emit_debug_payload<T: Serialize>(request_url: &str, payload: &T) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    tracing::debug!(
        target: "askchat::api",
        url = request_url,
        payload = %formatted_payload,
        "request payload"
    );
}

/// Install the global subscriber.
///
/// Output goes to `log_path` when given, otherwise to a fixed file while
/// stderr is an interactive terminal (so log lines never interleave with the
/// streamed answer), otherwise to stderr.
pub fn init_logging(log_path: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    let installed = match resolve_log_path(log_path) {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|error| anyhow::anyhow!("failed to install logger: {error}"))
}

fn resolve_log_path(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    explicit
        .filter(|path| !path.as_os_str().is_empty())
        .cloned()
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(PathBuf::from(DEFAULT_LOG_PATH))
            } else {
                None
            }
        })
}
