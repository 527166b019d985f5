use crate::config::Config;
use crate::error::RepoError;
use crate::kill::{KillSequencer, KillStep};
use crate::layout::{
    help_entry_width, main_content_height, normal_help_entries, PaneWidths, LOG_CONTENT_HEIGHT,
    PREVIEW_SCROLL_STEP,
};
use crate::view::SessionView;
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use zsm_core::text::{max_line_width, measure_width, pack_help_lines};
use zsm_core::{ProcessStats, Session};

const COPY_STATUS_TTL: Duration = Duration::from_secs(2);
const KILL_STATUS_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    ConfirmKill,
    Killing,
    Filter,
}

/// Everything that can change the model: terminal input plus the results of
/// effects coming back from the runtime.
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resized { width: u16, height: u16 },
    SessionsListed(Result<Vec<Session>, RepoError>),
    ProcessStats(HashMap<String, ProcessStats>),
    PreviewReady { name: String, content: String },
    KillCompleted { name: String, result: Result<(), RepoError> },
    PollTick,
    AllConfirmedGone,
    StatusExpired { generation: u64 },
    ClipboardCopied { text: String, result: Result<(), RepoError> },
}

/// Work the model asks for. The runtime performs it and answers with events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ListSessions,
    FetchProcessStats(Vec<Session>),
    FetchPreview { name: String, lines: usize },
    Kill(String),
    WaitForGone { names: Vec<String>, attempt: u32 },
    ClearStatusAfter { delay: Duration, generation: u64 },
    CopyToClipboard(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Heading,
    Progress,
    Success,
    Failure,
    Dim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub stamp: String,
    pub kind: LogKind,
    pub text: String,
}

/// Append-only activity log. New lines scroll the view to the bottom.
#[derive(Debug, Default)]
pub struct ActivityLog {
    lines: Vec<LogLine>,
    offset: usize,
}

impl ActivityLog {
    pub fn push(&mut self, kind: LogKind, text: impl Into<String>) {
        self.lines.push(LogLine {
            stamp: Local::now().format("%H:%M:%S").to_string(),
            kind,
            text: text.into(),
        });
        self.offset = self.max_offset();
    }

    fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(LOG_CONTENT_HEIGHT)
    }

    pub fn scroll_up(&mut self) {
        self.offset = self.offset.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        if self.offset < self.max_offset() {
            self.offset += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[cfg(test)]
    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    #[cfg(test)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The lines inside the viewport.
    pub fn window(&self) -> &[LogLine] {
        let start = self.offset.min(self.lines.len());
        let end = (start + LOG_CONTENT_HEIGHT).min(self.lines.len());
        &self.lines[start..end]
    }
}

pub struct App {
    pub mode: Mode,
    pub cursor: usize,
    pub list_offset: usize,
    pub selected: BTreeSet<String>,
    pub preview: String,
    pub preview_scroll: usize,
    pub log: ActivityLog,
    pub status: Option<String>,
    pub attach_target: Option<String>,
    pub should_quit: bool,
    pub width: usize,
    pub height: usize,
    pub list_error: Option<RepoError>,
    view: SessionView,
    kill: Option<KillSequencer>,
    status_generation: u64,
    pending_g: bool,
    config: Config,
}

impl App {
    pub fn new(config: &Config) -> Self {
        Self {
            mode: Mode::Normal,
            cursor: 0,
            list_offset: 0,
            selected: BTreeSet::new(),
            preview: String::new(),
            preview_scroll: 0,
            log: ActivityLog::default(),
            status: None,
            attach_target: None,
            should_quit: false,
            width: 0,
            height: 0,
            list_error: None,
            view: SessionView::default(),
            kill: None,
            status_generation: 0,
            pending_g: false,
            config: config.clone(),
        }
    }

    pub fn startup(&self) -> Vec<Effect> {
        vec![Effect::ListSessions]
    }

    pub fn tool(&self) -> &str {
        &self.config.tool
    }

    pub fn home(&self) -> Option<&Path> {
        self.config.home.as_deref()
    }

    pub fn view(&self) -> &SessionView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut SessionView {
        &mut self.view
    }

    #[cfg(test)]
    pub fn kill_in_progress(&self) -> Option<&KillSequencer> {
        self.kill.as_ref()
    }

    pub fn pane_widths(&mut self) -> PaneWidths {
        let total = self.view.sessions().len();
        let metrics = self.view.all_metrics();
        PaneWidths::compute(self.width, total, &metrics)
    }

    /// Lines the help bar takes at the current width. The renderer packs the
    /// same entries, so list rows and preview depth agree with what is drawn.
    pub fn help_lines(&self) -> usize {
        if self.mode != Mode::Normal {
            return 1;
        }
        let mut widths: Vec<usize> = normal_help_entries(!self.view.filter().is_empty())
            .into_iter()
            .map(|(key, description)| help_entry_width(key, description))
            .collect();
        if let Some(status) = &self.status {
            widths.push(measure_width(status));
        }
        pack_help_lines(&widths, self.width).len()
    }

    /// Rows inside the list and preview panes.
    pub fn content_rows(&self) -> usize {
        main_content_height(self.height, self.help_lines())
    }

    pub fn handle(&mut self, event: AppEvent) -> Vec<Effect> {
        match event {
            AppEvent::Key(key) => self.handle_key(key),
            AppEvent::Resized { width, height } => {
                self.width = usize::from(width);
                self.height = usize::from(height);
                self.ensure_visible();
                if self.mode == Mode::Killing {
                    Vec::new()
                } else {
                    self.preview_effect().into_iter().collect()
                }
            }
            AppEvent::SessionsListed(Ok(sessions)) => self.on_sessions_listed(sessions),
            AppEvent::SessionsListed(Err(err)) => {
                warn!(error = %err, "listing sessions failed");
                self.list_error = Some(err);
                Vec::new()
            }
            AppEvent::ProcessStats(stats) => {
                if self.view.merge_stats(&stats) {
                    debug!(sessions = stats.len(), "process stats merged");
                }
                Vec::new()
            }
            AppEvent::PreviewReady { name, content } => {
                if self.cursor_name().as_deref() == Some(name.as_str()) {
                    self.preview = content;
                }
                Vec::new()
            }
            AppEvent::KillCompleted { name, result } => self.on_kill_completed(name, result),
            AppEvent::PollTick => match self.kill.as_mut().map(KillSequencer::on_still_alive) {
                Some(step) => self.apply_kill_step(step),
                None => Vec::new(),
            },
            AppEvent::AllConfirmedGone => match self.kill.as_ref().map(KillSequencer::finish) {
                Some(step) => self.apply_kill_step(step),
                None => Vec::new(),
            },
            AppEvent::StatusExpired { generation } => {
                if generation == self.status_generation {
                    self.status = None;
                }
                Vec::new()
            }
            AppEvent::ClipboardCopied { text, result } => {
                match result {
                    Ok(()) => {
                        self.log.push(LogKind::Success, format!("  Copied: {text}"));
                        self.set_status("Copied!");
                    }
                    Err(err) => {
                        warn!(error = %err, "clipboard copy failed");
                        self.log
                            .push(LogKind::Failure, format!("  ✗ Copy failed: {err}"));
                        self.set_status(format!("Copy failed: {err}"));
                    }
                }
                vec![Effect::ClearStatusAfter {
                    delay: COPY_STATUS_TTL,
                    generation: self.status_generation,
                }]
            }
        }
    }

    fn on_sessions_listed(&mut self, sessions: Vec<Session>) -> Vec<Effect> {
        if self.list_error.take().is_some() {
            info!("listing sessions recovered");
        }
        self.view.replace_sessions(sessions);
        let view = &self.view;
        self.selected.retain(|name| view.contains(name));
        self.clamp_cursor();

        let mut effects = vec![Effect::FetchProcessStats(self.view.sessions().to_vec())];
        match self.preview_effect() {
            Some(effect) => effects.push(effect),
            None => self.preview.clear(),
        }
        effects
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status_generation += 1;
        self.status = Some(message.into());
    }

    fn cursor_name(&mut self) -> Option<String> {
        self.view.name_at(self.cursor)
    }

    fn preview_effect(&mut self) -> Option<Effect> {
        let name = self.cursor_name()?;
        Some(Effect::FetchPreview {
            name,
            lines: self.content_rows(),
        })
    }

    fn clamp_cursor(&mut self) {
        let len = self.view.visible_len();
        if self.cursor >= len {
            self.cursor = len.saturating_sub(1);
        }
        if self.list_offset > self.cursor {
            self.list_offset = self.cursor;
        }
    }

    /// Scrolls the list so the cursor row is inside the pane.
    pub fn ensure_visible(&mut self) {
        let rows = self.content_rows();
        if self.cursor < self.list_offset {
            self.list_offset = self.cursor;
        }
        if self.cursor >= self.list_offset + rows {
            self.list_offset = self.cursor + 1 - rows;
        }
    }

    fn reset_cursor(&mut self) {
        self.cursor = 0;
        self.list_offset = 0;
    }

    fn move_up(&mut self, reset_scroll: bool) -> Vec<Effect> {
        if self.cursor == 0 {
            return Vec::new();
        }
        self.cursor -= 1;
        self.after_move(reset_scroll)
    }

    fn move_down(&mut self, reset_scroll: bool) -> Vec<Effect> {
        if self.cursor + 1 >= self.view.visible_len() {
            return Vec::new();
        }
        self.cursor += 1;
        self.after_move(reset_scroll)
    }

    fn after_move(&mut self, reset_scroll: bool) -> Vec<Effect> {
        if reset_scroll {
            self.preview_scroll = 0;
        }
        self.ensure_visible();
        self.preview_effect().into_iter().collect()
    }

    fn go_top(&mut self) -> Vec<Effect> {
        if self.view.visible_len() == 0 {
            return Vec::new();
        }
        self.reset_cursor();
        self.preview_scroll = 0;
        self.preview_effect().into_iter().collect()
    }

    fn go_bottom(&mut self) -> Vec<Effect> {
        let len = self.view.visible_len();
        if len == 0 {
            return Vec::new();
        }
        self.cursor = len - 1;
        self.preview_scroll = 0;
        self.ensure_visible();
        self.preview_effect().into_iter().collect()
    }

    fn scroll_preview_right(&mut self) {
        let inner = self.pane_widths().preview_inner();
        let limit = max_line_width(&self.preview).saturating_sub(inner);
        self.preview_scroll = (self.preview_scroll + PREVIEW_SCROLL_STEP).min(limit);
    }

    fn toggle_selection(&mut self) {
        if let Some(name) = self.cursor_name() {
            if !self.selected.remove(&name) {
                self.selected.insert(name);
            }
        }
    }

    fn toggle_select_all(&mut self) {
        let names = self.view.visible_names();
        if names.is_empty() {
            return;
        }
        if names.iter().all(|name| self.selected.contains(name)) {
            for name in &names {
                self.selected.remove(name);
            }
        } else {
            self.selected.extend(names);
        }
    }

    fn prune_to_visible(&mut self) {
        let visible = self.view.visible_names();
        self.selected.retain(|name| visible.contains(name));
    }

    /// Selected sessions in list order, or the one under the cursor.
    pub fn kill_targets(&mut self) -> Vec<String> {
        if self.selected.is_empty() {
            return self.cursor_name().into_iter().collect();
        }
        let mut targets: Vec<String> = self
            .view
            .visible_names()
            .into_iter()
            .filter(|name| self.selected.contains(name))
            .collect();
        for name in &self.selected {
            if !targets.contains(name) {
                targets.push(name.clone());
            }
        }
        targets
    }

    fn quit(&mut self) -> Vec<Effect> {
        self.should_quit = true;
        Vec::new()
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if key.kind == KeyEventKind::Release {
            return Vec::new();
        }
        match self.mode {
            Mode::Killing => {
                if is_quit(&key) {
                    return self.quit();
                }
                self.scroll_log(&key);
                Vec::new()
            }
            Mode::Filter => self.handle_filter_key(key),
            Mode::ConfirmKill => self.handle_confirm_key(key),
            Mode::Normal => self.handle_normal_key(key),
        }
    }

    /// Returns whether the key was a log scroll key.
    fn scroll_log(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('[') => self.log.scroll_up(),
            KeyCode::Char(']') => self.log.scroll_down(),
            _ => return false,
        }
        true
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if is_quit(&key) {
            return self.quit();
        }
        if self.scroll_log(&key) {
            self.pending_g = false;
            return Vec::new();
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if key.code != KeyCode::Char('g') || ctrl {
            self.pending_g = false;
        }

        if matches!(key.code, KeyCode::Esc | KeyCode::Backspace) && !self.view.filter().is_empty() {
            self.view.set_filter("");
            self.reset_cursor();
            return self.preview_effect().into_iter().collect();
        }
        if ctrl {
            if key.code == KeyCode::Char('a') {
                self.toggle_select_all();
            }
            return Vec::new();
        }

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.move_up(true),
            KeyCode::Down | KeyCode::Char('j') => self.move_down(true),
            KeyCode::Home => self.go_top(),
            KeyCode::End | KeyCode::Char('G') => self.go_bottom(),
            KeyCode::Char('g') => {
                if self.pending_g {
                    self.pending_g = false;
                    self.go_top()
                } else {
                    self.pending_g = true;
                    Vec::new()
                }
            }
            KeyCode::Left => {
                self.preview_scroll = self.preview_scroll.saturating_sub(PREVIEW_SCROLL_STEP);
                Vec::new()
            }
            KeyCode::Right => {
                self.scroll_preview_right();
                Vec::new()
            }
            KeyCode::Char(' ') => {
                self.toggle_selection();
                Vec::new()
            }
            KeyCode::Enter => match self.cursor_name() {
                Some(name) => {
                    self.attach_target = Some(name);
                    self.quit()
                }
                None => Vec::new(),
            },
            KeyCode::Char('K') => {
                if !self.kill_targets().is_empty() {
                    self.mode = Mode::ConfirmKill;
                }
                Vec::new()
            }
            KeyCode::Char('c') => match self.cursor_name() {
                Some(name) => {
                    vec![Effect::CopyToClipboard(self.config.attach_command(&name))]
                }
                None => Vec::new(),
            },
            KeyCode::Char('r') => vec![Effect::ListSessions],
            KeyCode::Char('/') => {
                self.mode = Mode::Filter;
                Vec::new()
            }
            KeyCode::Char('s') => {
                self.view.cycle_sort();
                self.reset_cursor();
                self.preview_effect().into_iter().collect()
            }
            _ => Vec::new(),
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if is_ctrl_c(&key) {
            return self.quit();
        }
        match key.code {
            KeyCode::Esc => {
                self.view.set_filter("");
                self.mode = Mode::Normal;
                self.reset_cursor();
                self.preview_effect().into_iter().collect()
            }
            KeyCode::Enter => {
                self.mode = Mode::Normal;
                self.clamp_cursor();
                self.preview_effect().into_iter().collect()
            }
            KeyCode::Backspace => {
                if self.view.pop_filter() {
                    self.prune_to_visible();
                    self.reset_cursor();
                    Vec::new()
                } else {
                    self.mode = Mode::Normal;
                    self.preview_effect().into_iter().collect()
                }
            }
            KeyCode::Up => self.move_up(false),
            KeyCode::Down => self.move_down(false),
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.view.push_filter(c.encode_utf8(&mut [0; 4]));
                self.prune_to_visible();
                self.reset_cursor();
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if is_quit(&key) {
            return self.quit();
        }
        match key.code {
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('n') => {
                self.mode = Mode::Normal;
                Vec::new()
            }
            KeyCode::Char('y') => self.start_kill(),
            _ => Vec::new(),
        }
    }

    fn start_kill(&mut self) -> Vec<Effect> {
        let targets = self.kill_targets();
        let total = targets.len();
        let Some((sequencer, first)) = KillSequencer::start(targets, self.config.poll_max_attempts) else {
            self.mode = Mode::Normal;
            return Vec::new();
        };
        info!(count = total, "killing sessions");
        self.mode = Mode::Killing;
        self.kill = Some(sequencer);
        self.log
            .push(LogKind::Heading, format!("Killing {total} session(s)..."));
        self.log.push(LogKind::Progress, format!("  ⋯ {first}"));
        vec![Effect::Kill(first)]
    }

    fn on_kill_completed(&mut self, name: String, result: Result<(), RepoError>) -> Vec<Effect> {
        let step = match self.kill.as_mut() {
            Some(sequencer) => sequencer.on_kill_result(&name, result.is_ok()),
            None => None,
        };
        let Some(step) = step else {
            debug!(session = %name, "ignoring kill result outside the running sequence");
            return Vec::new();
        };
        match result {
            Ok(()) => {
                info!(session = %name, "session killed");
                self.log.push(LogKind::Success, format!("  ✓ {name}"));
            }
            Err(err) => {
                warn!(session = %name, error = %err, "kill failed");
                self.log.push(LogKind::Failure, format!("  ✗ {name}"));
                self.log.push(LogKind::Dim, format!("    {err}"));
            }
        }
        self.apply_kill_step(step)
    }

    fn apply_kill_step(&mut self, step: KillStep) -> Vec<Effect> {
        match step {
            KillStep::Issue(next) => {
                self.log.push(LogKind::Progress, format!("  ⋯ {next}"));
                vec![Effect::Kill(next)]
            }
            KillStep::Poll { names, attempt } => {
                if attempt == 0 {
                    self.log.push(LogKind::Dim, "  Waiting for cleanup...");
                }
                vec![Effect::WaitForGone { names, attempt }]
            }
            KillStep::Finished { killed } => self.finish_kill(killed),
        }
    }

    fn finish_kill(&mut self, killed: usize) -> Vec<Effect> {
        info!(killed, "kill sequence finished");
        self.log
            .push(LogKind::Success, format!("  Done. Killed {killed} session(s)."));
        self.mode = Mode::Normal;
        self.kill = None;
        self.selected.clear();
        self.view.set_filter("");
        self.reset_cursor();
        vec![
            Effect::ListSessions,
            Effect::ClearStatusAfter {
                delay: KILL_STATUS_TTL,
                generation: self.status_generation,
            },
        ]
    }
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

fn is_quit(key: &KeyEvent) -> bool {
    is_ctrl_c(key) || (key.code == KeyCode::Char('q') && key.modifiers.is_empty())
}
