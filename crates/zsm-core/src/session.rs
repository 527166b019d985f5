use std::path::Path;

/// One session reported by the session tool's `list` command.
///
/// `memory` and `uptime` are filled in later from the process table; zero means
/// the value is not known yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub name: String,
    pub pid: String,
    pub clients: u32,
    pub started_in: String,
    pub cmd: String,
    pub memory: u64,
    pub uptime: u64,
}

impl Session {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn pid_number(&self) -> Option<u32> {
        self.pid.trim().parse().ok()
    }

    /// Origin directory with the home prefix collapsed to `~`.
    pub fn display_dir(&self, home: Option<&Path>) -> String {
        let Some(home) = home.and_then(|path| path.to_str()) else {
            return self.started_in.clone();
        };
        let home = home.trim_end_matches('/');
        if home.is_empty() {
            return self.started_in.clone();
        }
        match self.started_in.strip_prefix(home) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => format!("~{rest}"),
            _ => self.started_in.clone(),
        }
    }
}

/// Parses `list` output: one record per line, tab separated `key=value` tokens.
///
/// Records without a session name are dropped, unknown keys are ignored and a
/// client count that is not a number counts as zero.
pub fn parse_session_list(output: &str) -> Vec<Session> {
    output.lines().filter_map(parse_session_record).collect()
}

fn parse_session_record(line: &str) -> Option<Session> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut session = Session::default();
    for field in line.split('\t') {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        match key.trim() {
            "session_name" => session.name = value.to_string(),
            "pid" => session.pid = value.trim().to_string(),
            "clients" => session.clients = value.trim().parse().unwrap_or(0),
            "started_in" => session.started_in = value.to_string(),
            "cmd" => session.cmd = value.to_string(),
            _ => {}
        }
    }

    if session.name.is_empty() {
        None
    } else {
        Some(session)
    }
}
