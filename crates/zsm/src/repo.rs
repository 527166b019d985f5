use crate::error::RepoError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};
use zsm_core::text::{expand_tabs, strip_control_sequences, TAB_STOP};
use zsm_core::{parse_session_list, ProcessTable, Session};

const PS_COLUMNS: &str = "pid,ppid,rss,etime";

/// Everything the dashboard needs from the outside world.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<Session>, RepoError>;

    /// Last `lines` lines of scrollback with escape sequences removed. Never
    /// fails: problems come back as a `(preview unavailable: ...)` line.
    async fn fetch_preview(&self, name: &str, lines: usize) -> String;

    async fn kill_session(&self, name: &str) -> Result<(), RepoError>;

    /// Empty when `ps` is unavailable; memory and uptime then stay unknown.
    async fn process_table(&self) -> ProcessTable;

    async fn copy_to_clipboard(&self, text: &str) -> Result<(), RepoError>;
}

pub struct ZmxRepository {
    tool_path: PathBuf,
    tool_name: String,
    preview_timeout: Duration,
    command_timeout: Duration,
}

impl ZmxRepository {
    pub fn new(
        tool_path: PathBuf,
        tool_name: impl Into<String>,
        preview_timeout: Duration,
        command_timeout: Duration,
    ) -> Self {
        Self {
            tool_path,
            tool_name: tool_name.into(),
            preview_timeout,
            command_timeout,
        }
    }

    fn label(&self, args: &[&str]) -> String {
        format!("{} {}", self.tool_name, args.join(" "))
    }

    async fn run_tool(&self, args: &[&str]) -> Result<Output, RepoError> {
        let mut command = Command::new(&self.tool_path);
        command.args(args);
        run_with_timeout(command, self.label(args), self.command_timeout).await
    }
}

async fn run_with_timeout(
    mut command: Command,
    label: String,
    limit: Duration,
) -> Result<Output, RepoError> {
    command.stdin(Stdio::null()).kill_on_drop(true);
    debug!(command = %label, "running");
    match tokio::time::timeout(limit, command.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(RepoError::Spawn {
            command: label,
            message: err.to_string(),
        }),
        Err(_) => Err(RepoError::TimedOut {
            command: label,
            after: limit,
        }),
    }
}

fn combined_output(output: &Output) -> Vec<u8> {
    let mut combined = output.stdout.clone();
    combined.extend_from_slice(&output.stderr);
    combined
}

fn preview_unavailable(reason: impl std::fmt::Display) -> String {
    format!("(preview unavailable: {reason})")
}

/// Reads `reader` to the end keeping only the last `keep` lines, each one
/// stripped of control sequences and with tabs expanded to spaces.
pub async fn tail_lines<R>(mut reader: R, keep: usize) -> std::io::Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let keep = keep.max(1);
    let mut tail: VecDeque<String> = VecDeque::with_capacity(keep + 1);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        let line = strip_control_sequences(&String::from_utf8_lossy(&buf));
        tail.push_back(expand_tabs(&line, TAB_STOP));
        if tail.len() > keep {
            tail.pop_front();
        }
    }
    Ok(Vec::from(tail).join("\n"))
}

#[async_trait]
impl SessionRepository for ZmxRepository {
    async fn list_sessions(&self) -> Result<Vec<Session>, RepoError> {
        let output = self.run_tool(&["list"]).await?;
        if !output.status.success() {
            return Err(RepoError::failed(
                self.label(&["list"]),
                output.status,
                &combined_output(&output),
            ));
        }
        Ok(parse_session_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn fetch_preview(&self, name: &str, lines: usize) -> String {
        let mut command = Command::new(&self.tool_path);
        command
            .args(["history", name, "--vt"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => return preview_unavailable(err),
        };
        let Some(stdout) = child.stdout.take() else {
            return preview_unavailable("no output stream");
        };

        let work = async {
            let tail = tail_lines(BufReader::new(stdout), lines).await?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((tail, status))
        };
        match tokio::time::timeout(self.preview_timeout, work).await {
            Err(_) => preview_unavailable("timed out"),
            Ok(Err(err)) => preview_unavailable(err),
            Ok(Ok((_, status))) if !status.success() => preview_unavailable(status),
            Ok(Ok((tail, _))) => tail,
        }
    }

    async fn kill_session(&self, name: &str) -> Result<(), RepoError> {
        let args = ["kill", name];
        let output = self.run_tool(&args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(RepoError::failed(
                self.label(&args),
                output.status,
                &combined_output(&output),
            ))
        }
    }

    async fn process_table(&self) -> ProcessTable {
        let mut command = Command::new("ps");
        command.args(["-eo", PS_COLUMNS]);
        let label = format!("ps -eo {PS_COLUMNS}");
        match run_with_timeout(command, label, self.command_timeout).await {
            Ok(output) if output.status.success() => {
                ProcessTable::parse(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                warn!(status = %output.status, "ps failed; memory and uptime unavailable");
                ProcessTable::default()
            }
            Err(err) => {
                warn!(error = %err, "ps failed; memory and uptime unavailable");
                ProcessTable::default()
            }
        }
    }

    async fn copy_to_clipboard(&self, text: &str) -> Result<(), RepoError> {
        let text = text.to_string();
        tokio::task::spawn_blocking(move || {
            arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text))
        })
        .await
        .map_err(|err| RepoError::Clipboard(err.to_string()))?
        .map_err(|err| RepoError::Clipboard(err.to_string()))
    }
}
