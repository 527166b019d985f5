use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TOOL: &str = "zmx";
const DEFAULT_PREVIEW_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 200;
const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 20;

#[derive(Clone, Debug)]
pub struct Config {
    pub tool: String,
    pub preview_timeout: Duration,
    pub command_timeout: Duration,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
    pub log_file: Option<PathBuf>,
    pub home: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool: DEFAULT_TOOL.to_string(),
            preview_timeout: Duration::from_millis(DEFAULT_PREVIEW_TIMEOUT_MS),
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            log_file: None,
            home: None,
        }
    }
}

impl Config {
    /// Command line the clipboard copy and the final exec both use.
    pub fn attach_command(&self, name: &str) -> String {
        format!("{} attach {name}", self.tool)
    }
}

pub fn load_config() -> Config {
    Config {
        tool: resolve_tool(),
        preview_timeout: resolve_millis("ZSM_PREVIEW_TIMEOUT_MS", DEFAULT_PREVIEW_TIMEOUT_MS),
        command_timeout: resolve_millis("ZSM_COMMAND_TIMEOUT_MS", DEFAULT_COMMAND_TIMEOUT_MS),
        poll_interval: resolve_millis("ZSM_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS),
        poll_max_attempts: std::env::var("ZSM_POLL_MAX_ATTEMPTS")
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .filter(|attempts| *attempts > 0)
            .unwrap_or(DEFAULT_POLL_MAX_ATTEMPTS),
        log_file: resolve_log_file(),
        home: dirs::home_dir(),
    }
}

fn resolve_tool() -> String {
    match std::env::var("ZSM_TOOL") {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => DEFAULT_TOOL.to_string(),
    }
}

fn resolve_millis(key: &str, default_ms: u64) -> Duration {
    let millis = std::env::var(key)
        .ok()
        .and_then(|value| parse_millis(&value))
        .unwrap_or(default_ms);
    Duration::from_millis(millis)
}

fn parse_millis(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|ms| *ms > 0)
}

fn resolve_log_file() -> Option<PathBuf> {
    std::env::var("ZSM_LOG_FILE")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Absolute path of `name` on `PATH`, if it is there.
pub fn which_cmd(name: &str) -> Option<PathBuf> {
    let candidate = PathBuf::from(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then_some(candidate);
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
