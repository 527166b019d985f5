use ratatui::style::{Color, Modifier, Style};

/// Every style the renderer uses. Built once and passed into `ui::render`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub border: Style,
    pub title: Style,
    pub sort: Style,
    pub selected: Style,
    pub normal: Style,
    pub active_client: Style,
    pub inactive_client: Style,
    pub pid: Style,
    pub memory: Style,
    pub uptime: Style,
    pub filter_match: Style,
    pub help: Style,
    pub help_key: Style,
    pub status: Style,
    pub confirm: Style,
    pub dim: Style,
    pub error: Style,
}

impl Default for Theme {
    fn default() -> Self {
        let fg = |index: u8| Style::new().fg(Color::Indexed(index));
        Self {
            border: fg(240),
            title: fg(99).add_modifier(Modifier::BOLD),
            sort: fg(75).add_modifier(Modifier::BOLD),
            selected: fg(212).add_modifier(Modifier::BOLD),
            normal: fg(252),
            active_client: fg(76),
            inactive_client: fg(240),
            pid: fg(245),
            memory: fg(180),
            uptime: fg(109),
            filter_match: fg(228).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            help: fg(241),
            help_key: fg(252).add_modifier(Modifier::BOLD),
            status: fg(76),
            confirm: fg(196).add_modifier(Modifier::BOLD),
            dim: fg(241),
            error: fg(196),
        }
    }
}
