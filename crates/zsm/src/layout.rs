//! Pane geometry and styled line composition.

use crate::theme::Theme;
use crate::view::ListMetrics;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use zsm_core::text::{bottom_border_fill, find_ignore_case, measure_width, pack_help_lines, TopBorder};

pub const LIST_MAX_OUTER_WIDTH: usize = 56;
pub const LOG_CONTENT_HEIGHT: usize = 4;
pub const PREVIEW_SCROLL_STEP: usize = 4;
const PREVIEW_MIN_OUTER_WIDTH: usize = 10;
/// List pane and log pane borders.
const BORDER_ROWS: usize = 4;
/// `" zmx sessions ("` plus `") "`; the count's digits come on top.
const LIST_TITLE_BASE: usize = 17;
/// Widest sort title, `" ↓ clients "`.
const SORT_TITLE_WIDTH: usize = 11;
const TITLE_CHROME: usize = 4;
const NAME_MIN_WIDTH: usize = 10;
/// Indicator plus the four single-space column gaps.
const ROW_FIXED_WIDTH: usize = 6;

/// Rows available inside the list and preview panes.
pub fn main_content_height(height: usize, help_lines: usize) -> usize {
    height
        .saturating_sub(LOG_CONTENT_HEIGHT + BORDER_ROWS + help_lines)
        .max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneWidths {
    pub list_outer: usize,
    pub preview_outer: usize,
}

impl PaneWidths {
    /// `total_sessions` and `metrics` describe the full session set, so the
    /// split does not move while a filter narrows the list.
    pub fn compute(width: usize, total_sessions: usize, metrics: &ListMetrics) -> Self {
        let digits = total_sessions.to_string().len();
        let title_min = LIST_TITLE_BASE + digits + SORT_TITLE_WIDTH + TITLE_CHROME;
        let mut list_outer = (metrics.row_width() + 2)
            .max(title_min)
            .min(LIST_MAX_OUTER_WIDTH);
        let half = width / 2;
        if list_outer > half && half >= title_min {
            list_outer = half;
        }
        let preview_outer = width
            .saturating_sub(list_outer)
            .max(PREVIEW_MIN_OUTER_WIDTH);
        Self {
            list_outer,
            preview_outer,
        }
    }

    pub fn list_inner(&self) -> usize {
        self.list_outer.saturating_sub(2)
    }

    pub fn preview_inner(&self) -> usize {
        self.preview_outer.saturating_sub(2)
    }
}

/// Cells left for the name column once the fixed columns are placed.
pub fn name_column_width(list_inner: usize, metrics: &ListMetrics) -> usize {
    list_inner
        .saturating_sub(ROW_FIXED_WIDTH + metrics.pid + metrics.memory + metrics.uptime + metrics.clients)
        .max(NAME_MIN_WIDTH)
}

/// `text` in `base` with the first case-insensitive occurrence of `query`
/// in `matched`.
pub fn highlight_match(text: &str, query: &str, base: Style, matched: Style) -> Vec<Span<'static>> {
    let Some(range) = find_ignore_case(text, query) else {
        return vec![Span::styled(text.to_string(), base)];
    };
    let mut spans = Vec::with_capacity(3);
    if range.start > 0 {
        spans.push(Span::styled(text[..range.start].to_string(), base));
    }
    spans.push(Span::styled(text[range.clone()].to_string(), matched));
    if range.end < text.len() {
        spans.push(Span::styled(text[range.end..].to_string(), base));
    }
    spans
}

pub fn top_border_line(
    left: &str,
    right: &str,
    outer_width: usize,
    theme: &Theme,
    right_style: Style,
) -> Line<'static> {
    let border = TopBorder::compose(left, right, outer_width);
    let mut spans = vec![
        Span::styled("╭─", theme.border),
        Span::styled(border.left, theme.title),
        Span::styled("─".repeat(border.fill), theme.border),
    ];
    if let Some(right) = border.right {
        spans.push(Span::styled(right, right_style));
    }
    spans.push(Span::styled("╮", theme.border));
    Line::from(spans)
}

pub fn bottom_border_line(label: &str, outer_width: usize, theme: &Theme) -> Line<'static> {
    let fill = bottom_border_fill(label, outer_width);
    Line::from(vec![
        Span::styled(format!("╰{}", "─".repeat(fill)), theme.border),
        Span::styled(label.to_string(), theme.selected),
        Span::styled("╯", theme.border),
    ])
}

/// Normal-mode help bar entries as `(key, description)`.
pub fn normal_help_entries(filter_active: bool) -> Vec<(&'static str, &'static str)> {
    let mut entries = vec![
        ("←→", "scroll"),
        ("↑↓/jk/gg/G", "nav"),
        ("space", "sel"),
        ("^a", "all"),
        ("enter", "attach"),
        ("K", "kill"),
        ("c", "copy cmd"),
        ("s", "sort"),
    ];
    if filter_active {
        entries.push(("esc", "clear"));
    } else {
        entries.push(("/", "filter"));
    }
    entries.push(("[]", "log"));
    entries.push(("q", "quit"));
    entries
}

/// Cells taken by `help_item(key, description, ..)`.
pub fn help_entry_width(key: &str, description: &str) -> usize {
    measure_width(key) + 1 + measure_width(description)
}

/// One help entry; its spans never wrap apart.
pub type HelpItem = Vec<Span<'static>>;

pub fn help_item(key: &str, description: &str, theme: &Theme) -> HelpItem {
    vec![
        Span::styled(key.to_string(), theme.help_key),
        Span::styled(format!(" {description}"), theme.help),
    ]
}

fn item_width(item: &HelpItem) -> usize {
    item.iter().map(|span| measure_width(&span.content)).sum()
}

/// Packs help items into as few lines as fit in `width` cells.
pub fn wrap_help(items: Vec<HelpItem>, width: usize) -> Vec<Line<'static>> {
    let widths: Vec<usize> = items.iter().map(item_width).collect();
    let ranges = pack_help_lines(&widths, width);
    let mut items = items.into_iter();
    ranges
        .into_iter()
        .map(|range| {
            let mut spans = vec![Span::raw(" ")];
            for (position, item) in items.by_ref().take(range.len()).enumerate() {
                if position > 0 {
                    spans.push(Span::raw("  "));
                }
                spans.extend(item);
            }
            Line::from(spans)
        })
        .collect()
}
