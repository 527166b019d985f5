use crate::session::Session;
use std::collections::HashMap;

const KIB: u64 = 1 << 10;
const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;

/// Guard against malformed tables that would otherwise recurse forever.
const MAX_TREE_DEPTH: usize = 64;

/// One row of `ps -eo pid,ppid,rss,etime`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRow {
    pub pid: u32,
    pub ppid: u32,
    pub rss_kib: u64,
    pub elapsed_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub memory: u64,
    pub uptime: u64,
}

/// In-memory view of the OS process table, built once per enrichment pass.
#[derive(Debug, Clone, Default)]
pub struct ProcessTable {
    rss_bytes: HashMap<u32, u64>,
    children: HashMap<u32, Vec<u32>>,
    elapsed: HashMap<u32, u64>,
}

impl ProcessTable {
    /// Parses `ps` output. The header line and any row that does not have
    /// exactly four fields with numeric pid/ppid/rss are skipped.
    pub fn parse(output: &str) -> Self {
        Self::from_rows(output.lines().filter_map(parse_row))
    }

    pub fn from_rows(rows: impl IntoIterator<Item = ProcessRow>) -> Self {
        let mut table = Self::default();
        for row in rows {
            table
                .rss_bytes
                .insert(row.pid, row.rss_kib.saturating_mul(KIB));
            table.children.entry(row.ppid).or_default().push(row.pid);
            table.elapsed.insert(row.pid, row.elapsed_secs);
        }
        table
    }

    pub fn is_empty(&self) -> bool {
        self.rss_bytes.is_empty()
    }

    pub fn children(&self, pid: u32) -> &[u32] {
        self.children.get(&pid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn elapsed(&self, pid: u32) -> u64 {
        self.elapsed.get(&pid).copied().unwrap_or(0)
    }

    /// Resident memory of `pid` plus every descendant, in bytes.
    pub fn subtree_memory(&self, pid: u32) -> u64 {
        self.subtree_memory_at(pid, 0)
    }

    fn subtree_memory_at(&self, pid: u32, depth: usize) -> u64 {
        let own = self.rss_bytes.get(&pid).copied().unwrap_or(0);
        if depth >= MAX_TREE_DEPTH {
            return own;
        }
        self.children(pid)
            .iter()
            // ps reports the swapper (pid 0) as its own parent on some systems
            .filter(|child| **child != pid)
            .fold(own, |total, child| {
                total.saturating_add(self.subtree_memory_at(*child, depth + 1))
            })
    }

    /// Memory and uptime keyed by session name. Sessions whose pid is not a
    /// number are left out.
    pub fn stats_for(&self, sessions: &[Session]) -> HashMap<String, ProcessStats> {
        sessions
            .iter()
            .filter_map(|session| {
                let pid = session.pid_number()?;
                Some((
                    session.name.clone(),
                    ProcessStats {
                        memory: self.subtree_memory(pid),
                        uptime: self.elapsed(pid),
                    },
                ))
            })
            .collect()
    }
}

fn parse_row(line: &str) -> Option<ProcessRow> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [pid, ppid, rss, etime] = fields.as_slice() else {
        return None;
    };
    Some(ProcessRow {
        pid: pid.parse().ok()?,
        ppid: ppid.parse().ok()?,
        rss_kib: rss.parse().ok()?,
        elapsed_secs: parse_elapsed(etime),
    })
}

/// Parses the `etime` column: `ss`, `mm:ss`, `hh:mm:ss` or `d-hh:mm:ss`.
/// Components that are not numbers count as zero.
pub fn parse_elapsed(raw: &str) -> u64 {
    let raw = raw.trim();
    let (days, clock) = match raw.split_once('-') {
        Some((days, clock)) => (days.parse::<u64>().unwrap_or(0), clock),
        None => (0, raw),
    };
    let secs = clock.split(':').fold(0u64, |total, part| {
        total
            .saturating_mul(60)
            .saturating_add(part.parse::<u64>().unwrap_or(0))
    });
    days.saturating_mul(86_400).saturating_add(secs)
}

/// Compact byte count: `512B`, `50K`, `142M`, `1.5G`, `15G`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= GIB {
        let value = bytes as f64 / GIB as f64;
        if value >= 10.0 {
            format!("{value:.0}G")
        } else {
            format!("{value:.1}G")
        }
    } else if bytes >= MIB {
        format!("{}M", bytes / MIB)
    } else if bytes >= KIB {
        format!("{}K", bytes / KIB)
    } else {
        format!("{bytes}B")
    }
}

/// Single-unit duration, floor divided: `59s`, `59m`, `23h`, `3d`.
pub fn format_uptime(secs: u64) -> String {
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3_599 => format!("{}m", secs / 60),
        3_600..=86_399 => format!("{}h", secs / 3_600),
        _ => format!("{}d", secs / 86_400),
    }
}
