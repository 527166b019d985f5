use std::time::Duration;
use thiserror::Error;

/// Failure of one call to the session tool, `ps` or the clipboard.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoError {
    #[error("{command}: {message}")]
    Spawn { command: String, message: String },
    #[error("{command}: {detail}")]
    Failed { command: String, detail: String },
    #[error("{command}: timed out after {}ms", .after.as_millis())]
    TimedOut { command: String, after: Duration },
    #[error("{0}")]
    Clipboard(String),
}

impl RepoError {
    pub fn failed(command: impl Into<String>, status: impl std::fmt::Display, output: &[u8]) -> Self {
        let output = String::from_utf8_lossy(output);
        let output = output.trim();
        let detail = if output.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {output}")
        };
        Self::Failed {
            command: command.into(),
            detail,
        }
    }
}
