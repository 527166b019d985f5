use std::cmp::Ordering;
use std::collections::HashMap;
use zsm_core::text::{contains_ignore_case, measure_width};
use zsm_core::{format_bytes, format_uptime, ProcessStats, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    Name,
    Clients,
    Pid,
    Memory,
    Uptime,
}

impl SortMode {
    pub fn label(self) -> &'static str {
        match self {
            SortMode::Name => "name",
            SortMode::Clients => "clients",
            SortMode::Pid => "pid",
            SortMode::Memory => "memory",
            SortMode::Uptime => "uptime",
        }
    }

    pub fn next(self) -> Self {
        match self {
            SortMode::Name => SortMode::Clients,
            SortMode::Clients => SortMode::Pid,
            SortMode::Pid => SortMode::Memory,
            SortMode::Memory => SortMode::Uptime,
            SortMode::Uptime => SortMode::Name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewCriteria {
    pub filter: String,
    pub sort: SortMode,
    pub ascending: bool,
}

impl Default for ViewCriteria {
    fn default() -> Self {
        Self {
            filter: String::new(),
            sort: SortMode::Name,
            ascending: true,
        }
    }
}

/// Column widths in cells for the session table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMetrics {
    pub name: usize,
    pub pid: usize,
    pub memory: usize,
    pub uptime: usize,
    pub clients: usize,
}

impl Default for ListMetrics {
    fn default() -> Self {
        Self {
            name: 0,
            pid: 1,
            memory: 1,
            uptime: 1,
            clients: 2,
        }
    }
}

impl ListMetrics {
    pub fn compute(sessions: &[Session]) -> Self {
        sessions.iter().fold(Self::default(), |metrics, session| Self {
            name: metrics.name.max(measure_width(&session.name)),
            pid: metrics.pid.max(measure_width(&session.pid)),
            memory: metrics.memory.max(measure_width(&memory_label(session))),
            uptime: metrics.uptime.max(measure_width(&uptime_label(session))),
            clients: metrics.clients.max(measure_width(&client_badge(session))),
        })
    }

    /// Cells a full row needs: indicator, the five columns and their gaps.
    pub fn row_width(&self) -> usize {
        2 + self.name + 1 + self.pid + 1 + self.memory + 1 + self.uptime + 1 + self.clients
    }
}

pub fn memory_label(session: &Session) -> String {
    if session.memory > 0 {
        format_bytes(session.memory)
    } else {
        "-".to_string()
    }
}

pub fn uptime_label(session: &Session) -> String {
    if session.uptime > 0 {
        format_uptime(session.uptime)
    } else {
        "-".to_string()
    }
}

pub fn client_badge(session: &Session) -> String {
    if session.clients > 0 {
        format!("●{}", session.clients)
    } else {
        "○0".to_string()
    }
}

pub fn matches_filter(session: &Session, filter: &str) -> bool {
    contains_ignore_case(&session.name, filter) || contains_ignore_case(&session.started_in, filter)
}

/// Primary key per sort mode, direction applied; ties always fall back to the
/// name in ascending order.
pub fn compare_sessions(a: &Session, b: &Session, sort: SortMode, ascending: bool) -> Ordering {
    let primary = match sort {
        SortMode::Name => a.name.cmp(&b.name),
        SortMode::Clients => a.clients.cmp(&b.clients),
        SortMode::Pid => pid_key(a).cmp(&pid_key(b)),
        SortMode::Memory => a.memory.cmp(&b.memory),
        SortMode::Uptime => a.uptime.cmp(&b.uptime),
    };
    let primary = if ascending { primary } else { primary.reverse() };
    primary.then_with(|| a.name.cmp(&b.name))
}

fn pid_key(session: &Session) -> u32 {
    session.pid_number().unwrap_or(0)
}

pub fn compute_visible(sessions: &[Session], criteria: &ViewCriteria) -> Vec<Session> {
    let mut visible: Vec<Session> = if criteria.filter.is_empty() {
        sessions.to_vec()
    } else {
        sessions
            .iter()
            .filter(|session| matches_filter(session, &criteria.filter))
            .cloned()
            .collect()
    };
    visible.sort_by(|a, b| compare_sessions(a, b, criteria.sort, criteria.ascending));
    visible
}

/// The session snapshot plus its filtered, sorted projection.
///
/// Every mutation bumps a version counter. Reads of the projection go through
/// `visible`/`visible_metrics`/`all_metrics`, which rebuild only when the
/// versions recorded at build time are stale. The full-set metrics depend on
/// the sessions alone so the list pane keeps its width while filtering.
#[derive(Debug, Default)]
pub struct SessionView {
    sessions: Vec<Session>,
    criteria: ViewCriteria,
    sessions_version: u64,
    criteria_version: u64,
    visible: Vec<Session>,
    visible_metrics: ListMetrics,
    visible_built: Option<(u64, u64)>,
    all_metrics: ListMetrics,
    all_built: Option<u64>,
}

impl SessionView {
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn criteria(&self) -> &ViewCriteria {
        &self.criteria
    }

    pub fn filter(&self) -> &str {
        &self.criteria.filter
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.iter().any(|session| session.name == name)
    }

    /// Replaces the snapshot. Memory and uptime of a session that is still
    /// there under the same pid carry over until fresh stats arrive.
    pub fn replace_sessions(&mut self, mut sessions: Vec<Session>) {
        let previous: HashMap<&str, &Session> = self
            .sessions
            .iter()
            .map(|session| (session.name.as_str(), session))
            .collect();
        for session in &mut sessions {
            if let Some(old) = previous.get(session.name.as_str()) {
                if old.pid == session.pid {
                    session.memory = old.memory;
                    session.uptime = old.uptime;
                }
            }
        }
        self.sessions = sessions;
        self.sessions_version += 1;
    }

    /// Returns whether any session changed.
    pub fn merge_stats(&mut self, stats: &HashMap<String, ProcessStats>) -> bool {
        let mut updated = false;
        for session in &mut self.sessions {
            let Some(info) = stats.get(&session.name) else {
                continue;
            };
            if session.memory != info.memory || session.uptime != info.uptime {
                session.memory = info.memory;
                session.uptime = info.uptime;
                updated = true;
            }
        }
        if updated {
            self.sessions_version += 1;
        }
        updated
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        let filter = filter.into();
        if filter != self.criteria.filter {
            self.criteria.filter = filter;
            self.criteria_version += 1;
        }
    }

    pub fn push_filter(&mut self, text: &str) {
        if !text.is_empty() {
            self.criteria.filter.push_str(text);
            self.criteria_version += 1;
        }
    }

    /// Removes the last character; false when the filter was already empty.
    pub fn pop_filter(&mut self) -> bool {
        if self.criteria.filter.pop().is_some() {
            self.criteria_version += 1;
            true
        } else {
            false
        }
    }

    /// Ascending flips to descending on the same key; descending flips back
    /// and moves to the next key.
    pub fn cycle_sort(&mut self) {
        if self.criteria.ascending {
            self.criteria.ascending = false;
        } else {
            self.criteria.ascending = true;
            self.criteria.sort = self.criteria.sort.next();
        }
        self.criteria_version += 1;
    }

    fn ensure_visible(&mut self) {
        let key = (self.sessions_version, self.criteria_version);
        if self.visible_built == Some(key) {
            return;
        }
        self.visible = compute_visible(&self.sessions, &self.criteria);
        self.visible_metrics = ListMetrics::compute(&self.visible);
        self.visible_built = Some(key);
    }

    pub fn visible(&mut self) -> &[Session] {
        self.ensure_visible();
        &self.visible
    }

    pub fn visible_metrics(&mut self) -> ListMetrics {
        self.ensure_visible();
        self.visible_metrics
    }

    pub fn all_metrics(&mut self) -> ListMetrics {
        if self.all_built != Some(self.sessions_version) {
            self.all_metrics = ListMetrics::compute(&self.sessions);
            self.all_built = Some(self.sessions_version);
        }
        self.all_metrics
    }

    pub fn visible_len(&mut self) -> usize {
        self.visible().len()
    }

    pub fn name_at(&mut self, index: usize) -> Option<String> {
        self.visible().get(index).map(|session| session.name.clone())
    }

    pub fn visible_names(&mut self) -> Vec<String> {
        self.visible()
            .iter()
            .map(|session| session.name.clone())
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn session(name: &str, pid: &str, clients: u32, dir: &str) -> Session {
        Session {
            name: name.to_string(),
            pid: pid.to_string(),
            clients,
            started_in: dir.to_string(),
            cmd: "sh".to_string(),
            memory: 0,
            uptime: 0,
        }
    }

    fn names(sessions: &[Session]) -> Vec<&str> {
        sessions.iter().map(|session| session.name.as_str()).collect()
    }

    #[test]
    fn filter_matches_name_or_directory_case_insensitively() {
        let sessions = vec![
            session("Api", "1", 0, "/srv"),
            session("notes", "2", 0, "/home/me/API-docs"),
            session("shell", "3", 0, "/tmp"),
        ];
        let criteria = ViewCriteria {
            filter: "api".to_string(),
            ..ViewCriteria::default()
        };
        assert_eq!(names(&compute_visible(&sessions, &criteria)), ["Api", "notes"]);
    }

    #[test]
    fn descending_reverses_primary_key_only() {
        let sessions = vec![
            session("b", "10", 1, "/"),
            session("a", "20", 1, "/"),
            session("c", "30", 3, "/"),
        ];
        let asc = ViewCriteria {
            sort: SortMode::Clients,
            ..ViewCriteria::default()
        };
        let desc = ViewCriteria {
            ascending: false,
            ..asc.clone()
        };
        assert_eq!(names(&compute_visible(&sessions, &asc)), ["a", "b", "c"]);
        assert_eq!(names(&compute_visible(&sessions, &desc)), ["c", "a", "b"]);
    }

    #[test]
    fn pid_sort_is_numeric() {
        let sessions = vec![
            session("x", "100", 0, "/"),
            session("y", "9", 0, "/"),
            session("z", "n/a", 0, "/"),
        ];
        let criteria = ViewCriteria {
            sort: SortMode::Pid,
            ..ViewCriteria::default()
        };
        assert_eq!(names(&compute_visible(&sessions, &criteria)), ["z", "y", "x"]);
    }

    #[test]
    fn sort_cycle_visits_every_key_in_both_directions() {
        let mut view = SessionView::default();
        let mut seen = Vec::new();
        for _ in 0..10 {
            let criteria = view.criteria();
            seen.push((criteria.sort, criteria.ascending));
            view.cycle_sort();
        }
        assert_eq!(
            seen[..4],
            [
                (SortMode::Name, true),
                (SortMode::Name, false),
                (SortMode::Clients, true),
                (SortMode::Clients, false),
            ]
        );
        assert_eq!(view.criteria().sort, SortMode::Name);
        assert!(view.criteria().ascending);
    }

    #[test]
    fn metrics_have_floors_and_count_placeholders() {
        let empty = ListMetrics::compute(&[]);
        assert_eq!(empty, ListMetrics::default());

        let mut big = session("long-session-name", "123456", 12, "/");
        big.memory = 142 * 1024 * 1024;
        big.uptime = 7_200;
        let metrics = ListMetrics::compute(&[big, session("s", "1", 0, "/")]);
        assert_eq!(metrics.name, 17);
        assert_eq!(metrics.pid, 6);
        assert_eq!(metrics.memory, 4);
        assert_eq!(metrics.uptime, 2);
        assert_eq!(metrics.clients, 3);
    }

    #[test]
    fn projection_follows_filter_and_sort_changes() {
        let mut view = SessionView::default();
        view.replace_sessions(vec![
            session("beta", "2", 0, "/"),
            session("alpha", "1", 0, "/"),
            session("gamma", "3", 0, "/"),
        ]);
        assert_eq!(view.visible_names(), ["alpha", "beta", "gamma"]);

        view.push_filter("a");
        view.push_filter("l");
        assert_eq!(view.visible_names(), ["alpha"]);

        view.set_filter("");
        view.cycle_sort();
        assert_eq!(view.visible_names(), ["gamma", "beta", "alpha"]);
    }

    #[test]
    fn full_set_metrics_ignore_the_filter() {
        let mut view = SessionView::default();
        view.replace_sessions(vec![
            session("a-very-long-name", "1", 0, "/"),
            session("short", "2", 0, "/"),
        ]);
        view.set_filter("short");
        assert_eq!(view.visible_metrics().name, 5);
        assert_eq!(view.all_metrics().name, 16);
    }

    #[test]
    fn stats_merge_invalidates_only_on_change() {
        let mut view = SessionView::default();
        view.replace_sessions(vec![session("api", "7", 0, "/")]);
        let stats = HashMap::from([(
            "api".to_string(),
            ProcessStats {
                memory: 2048,
                uptime: 90,
            },
        )]);
        assert!(view.merge_stats(&stats));
        assert!(!view.merge_stats(&stats));
        assert_eq!(view.visible()[0].memory, 2048);
        assert_eq!(view.visible_metrics().memory, 2);
        assert_eq!(view.visible_metrics().uptime, 2);
    }

    #[test]
    fn refresh_carries_stats_for_same_pid() {
        let mut view = SessionView::default();
        view.replace_sessions(vec![session("api", "7", 0, "/"), session("db", "8", 0, "/")]);
        view.merge_stats(&HashMap::from([
            ("api".to_string(), ProcessStats { memory: 10, uptime: 5 }),
            ("db".to_string(), ProcessStats { memory: 20, uptime: 6 }),
        ]));

        view.replace_sessions(vec![session("api", "7", 1, "/"), session("db", "99", 0, "/")]);
        assert_eq!(view.sessions()[0].memory, 10);
        assert_eq!(view.sessions()[0].clients, 1);
        assert_eq!(view.sessions()[1].memory, 0);
    }

    fn arb_session() -> impl Strategy<Value = Session> {
        ("[a-dA-D]{1,4}", 0u32..4, "[a-d/]{0,6}", 0u64..3, 0u64..3, 0u32..50).prop_map(
            |(name, clients, dir, memory, uptime, pid)| Session {
                name,
                pid: pid.to_string(),
                clients,
                started_in: dir,
                cmd: String::new(),
                memory,
                uptime,
            },
        )
    }

    fn arb_sort() -> impl Strategy<Value = SortMode> {
        prop_oneof![
            Just(SortMode::Name),
            Just(SortMode::Clients),
            Just(SortMode::Pid),
            Just(SortMode::Memory),
            Just(SortMode::Uptime),
        ]
    }

    proptest! {
        #[test]
        fn filtered_entries_all_match_and_excluded_never_do(
            sessions in proptest::collection::vec(arb_session(), 0..12),
            filter in "[a-dA-D/]{0,3}",
        ) {
            let criteria = ViewCriteria { filter: filter.clone(), ..ViewCriteria::default() };
            let visible = compute_visible(&sessions, &criteria);
            for session in &visible {
                prop_assert!(matches_filter(session, &filter));
            }
            let kept = sessions.iter().filter(|session| matches_filter(session, &filter)).count();
            prop_assert_eq!(kept, visible.len());
        }

        #[test]
        fn sorted_output_is_ordered_with_ascending_name_ties(
            sessions in proptest::collection::vec(arb_session(), 0..12),
            sort in arb_sort(),
            ascending in any::<bool>(),
        ) {
            let criteria = ViewCriteria { filter: String::new(), sort, ascending };
            let visible = compute_visible(&sessions, &criteria);
            for pair in visible.windows(2) {
                prop_assert_ne!(
                    compare_sessions(&pair[0], &pair[1], sort, ascending),
                    Ordering::Greater
                );
                let asc = compare_sessions(&pair[0], &pair[1], sort, true);
                let desc = compare_sessions(&pair[0], &pair[1], sort, false);
                if asc == desc {
                    prop_assert!(pair[0].name <= pair[1].name);
                }
            }
            prop_assert_eq!(visible.len(), sessions.len());
        }
    }
}
