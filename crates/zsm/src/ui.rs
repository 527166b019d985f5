use crate::app::{App, LogKind, LogLine, Mode};
use crate::layout::{
    bottom_border_line, help_item, highlight_match, name_column_width, normal_help_entries,
    top_border_line, wrap_help, HelpItem, PaneWidths, LOG_CONTENT_HEIGHT,
};
use crate::theme::Theme;
use crate::view::{client_badge, memory_label, uptime_label, ListMetrics};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use zsm_core::text::{pad_left, pad_right, scroll_line, truncate};
use zsm_core::Session;

fn cells(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

pub fn render(f: &mut Frame, app: &mut App, theme: &Theme) {
    let area = f.size();

    if let Some(err) = &app.list_error {
        let text = vec![
            Line::raw(""),
            Line::styled(format!("  Error: {err}"), theme.error),
            Line::raw(""),
            Line::styled(
                format!("  Is {} installed and in your PATH?", app.tool()),
                theme.normal,
            ),
        ];
        f.render_widget(Paragraph::new(text), area);
        return;
    }
    if app.width == 0 {
        f.render_widget(Paragraph::new("  Loading..."), area);
        return;
    }

    let help = render_help(app, theme);
    let content_height = app.content_rows();
    app.ensure_visible();
    let widths = app.pane_widths();
    let body_height = cells(content_height + 2);

    let list_area = Rect::new(area.x, area.y, cells(widths.list_outer), body_height).intersection(area);
    let preview_area = Rect::new(
        area.x.saturating_add(cells(widths.list_outer)),
        area.y,
        cells(widths.preview_outer),
        body_height,
    )
    .intersection(area);
    let log_top = area.y.saturating_add(body_height);
    let log_area = Rect::new(area.x, log_top, area.width, cells(LOG_CONTENT_HEIGHT + 2)).intersection(area);
    let help_area = Rect::new(
        area.x,
        log_top.saturating_add(cells(LOG_CONTENT_HEIGHT + 2)),
        area.width,
        cells(help.len()),
    )
    .intersection(area);

    render_list(f, app, theme, list_area, &widths, content_height);
    render_preview(f, app, theme, preview_area, &widths, content_height);
    render_log(f, app, theme, log_area);
    f.render_widget(Paragraph::new(help), help_area);
}

/// Rounded pane with custom top (and optionally bottom) border lines drawn
/// over the block's own.
fn render_pane(
    f: &mut Frame,
    area: Rect,
    theme: &Theme,
    top: Line<'static>,
    bottom: Option<Line<'static>>,
    body: Vec<Line<'static>>,
) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme.border);
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(Paragraph::new(body), inner);
    f.render_widget(Paragraph::new(top), Rect { height: 1, ..area });
    if let Some(bottom) = bottom {
        if area.height > 1 {
            let y = area.y + area.height - 1;
            f.render_widget(Paragraph::new(bottom), Rect { y, height: 1, ..area });
        }
    }
}

fn render_list(
    f: &mut Frame,
    app: &mut App,
    theme: &Theme,
    area: Rect,
    widths: &PaneWidths,
    rows: usize,
) {
    let outer_width = widths.list_outer;
    let total = app.view().sessions().len();
    let metrics = app.view_mut().visible_metrics();
    let visible_len = app.view_mut().visible_len();
    let criteria = app.view().criteria().clone();

    let left = if visible_len == total {
        format!(" zmx sessions ({visible_len}) ")
    } else {
        format!(" zmx ({visible_len}/{total}) ")
    };
    let arrow = if criteria.ascending { "↑" } else { "↓" };
    let right = format!(" {arrow} {} ", criteria.sort.label());
    let top = top_border_line(&left, &right, outer_width, theme, theme.sort);
    let bottom = (!app.selected.is_empty())
        .then(|| bottom_border_line(&format!(" {} sel ", app.selected.len()), outer_width, theme));

    let body = if visible_len == 0 {
        let message = if criteria.filter.is_empty() {
            "  No sessions found. Press r to refresh."
        } else {
            "  No matches. Esc to clear filter."
        };
        vec![Line::styled(message, theme.normal)]
    } else {
        let start = app.list_offset.min(visible_len);
        let end = (start + rows).min(visible_len);
        let window = app.view_mut().visible()[start..end].to_vec();
        let name_width = name_column_width(widths.list_inner(), &metrics);
        window
            .iter()
            .enumerate()
            .map(|(idx, session)| {
                let is_cursor = start + idx == app.cursor;
                let is_selected = app.selected.contains(&session.name);
                list_row(
                    session,
                    is_cursor,
                    is_selected,
                    &criteria.filter,
                    name_width,
                    &metrics,
                    theme,
                )
            })
            .collect()
    };

    render_pane(f, area, theme, top, bottom, body);
}

fn list_row(
    session: &Session,
    is_cursor: bool,
    is_selected: bool,
    filter: &str,
    name_width: usize,
    metrics: &ListMetrics,
    theme: &Theme,
) -> Line<'static> {
    let indicator = match (is_cursor, is_selected) {
        (true, true) => Span::styled("▸●", theme.selected),
        (true, false) => Span::styled("▸ ", theme.selected),
        (false, true) => Span::styled(" ●", theme.selected),
        (false, false) => Span::raw("  "),
    };
    let name_style = if is_cursor || is_selected {
        theme.selected
    } else {
        theme.normal
    };
    let name = pad_right(&truncate(&session.name, name_width), name_width);
    let client_style = if session.clients > 0 {
        theme.active_client
    } else {
        theme.inactive_client
    };

    let mut spans = vec![indicator];
    if filter.is_empty() {
        spans.push(Span::styled(name, name_style));
    } else {
        spans.extend(highlight_match(&name, filter, name_style, theme.filter_match));
    }
    spans.extend([
        Span::raw(" "),
        Span::styled(pad_left(&session.pid, metrics.pid), theme.pid),
        Span::raw(" "),
        Span::styled(pad_left(&memory_label(session), metrics.memory), theme.memory),
        Span::raw(" "),
        Span::styled(pad_left(&uptime_label(session), metrics.uptime), theme.uptime),
        Span::raw(" "),
        Span::styled(pad_left(&client_badge(session), metrics.clients), client_style),
    ]);
    Line::from(spans)
}

fn render_preview(
    f: &mut Frame,
    app: &mut App,
    theme: &Theme,
    area: Rect,
    widths: &PaneWidths,
    rows: usize,
) {
    let outer_width = widths.preview_outer;
    let inner_width = widths.preview_inner();
    let cursor = app.cursor;
    let current = app.view_mut().visible().get(cursor).cloned();
    let (left, right) = match &current {
        Some(session) => (
            format!(" {} ", session.name),
            format!(" 📂 {} ", session.display_dir(app.home())),
        ),
        None => (" Preview ".to_string(), String::new()),
    };
    let top = top_border_line(&left, &right, outer_width, theme, theme.dim);
    let lines: Vec<&str> = app.preview.split('\n').collect();
    let body = lines[lines.len().saturating_sub(rows)..]
        .iter()
        .map(|line| Line::raw(scroll_line(line, app.preview_scroll, inner_width)))
        .collect();
    render_pane(f, area, theme, top, None, body);
}

fn log_line(line: &LogLine, theme: &Theme) -> Line<'static> {
    let style = match line.kind {
        LogKind::Heading => theme.title,
        LogKind::Progress => theme.help,
        LogKind::Success => theme.status,
        LogKind::Failure => theme.confirm,
        LogKind::Dim => theme.dim,
    };
    Line::from(vec![
        Span::styled(line.stamp.clone(), theme.dim),
        Span::raw(" "),
        Span::styled(line.text.clone(), style),
    ])
}

fn render_log(f: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let title = if app.mode == Mode::Killing {
        " Killing... "
    } else {
        " Activity Log "
    };
    let top = top_border_line(title, "", usize::from(area.width), theme, theme.dim);
    let body = if app.log.is_empty() {
        vec![Line::styled("  No activity yet.", theme.dim)]
    } else {
        app.log.window().iter().map(|line| log_line(line, theme)).collect()
    };
    render_pane(f, area, theme, top, None, body);
}

fn render_help(app: &mut App, theme: &Theme) -> Vec<Line<'static>> {
    match app.mode {
        Mode::Killing => vec![Line::from(vec![
            Span::styled(" [] scroll log  ", theme.help),
            Span::styled("q", theme.help_key),
            Span::styled(" quit", theme.help),
        ])],
        Mode::Filter => vec![Line::from(vec![
            Span::styled(" /", theme.help),
            Span::styled(app.view().filter().to_string(), theme.help_key),
            Span::styled("█  Enter accept | Esc clear", theme.help),
        ])],
        Mode::ConfirmKill => {
            let targets = app.kill_targets();
            let prompt = match targets.as_slice() {
                [single] => format!(" Kill {single}? y/n "),
                _ => format!(" Kill {} sessions? y/n ", targets.len()),
            };
            vec![Line::styled(prompt, theme.confirm)]
        }
        Mode::Normal => {
            let mut items: Vec<HelpItem> = normal_help_entries(!app.view().filter().is_empty())
                .into_iter()
                .map(|(key, description)| help_item(key, description, theme))
                .collect();
            if let Some(status) = &app.status {
                items.push(vec![Span::styled(status.clone(), theme.status)]);
            }
            wrap_help(items, app.width)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppEvent;
    use crate::config::Config;
    use crate::error::RepoError;
    use crate::layout::main_content_height;
    use crate::view::tests::session;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(app: &mut App, width: u16, height: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        let theme = Theme::default();
        terminal.draw(|f| render(f, app, &theme)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| buffer.get(x, y).symbol().to_string())
                    .collect::<String>()
            })
            .collect()
    }

    fn app_with(names: &[&str], width: u16, height: u16) -> App {
        let mut app = App::new(&Config::default());
        app.handle(AppEvent::Resized { width, height });
        let sessions = names
            .iter()
            .map(|name| session(name, "42", 1, "/srv"))
            .collect();
        app.handle(AppEvent::SessionsListed(Ok(sessions)));
        app
    }

    #[test]
    fn loading_until_first_resize() {
        let mut app = App::new(&Config::default());
        let rows = draw(&mut app, 40, 5);
        assert!(rows[0].starts_with("  Loading..."));
    }

    #[test]
    fn error_view_replaces_dashboard() {
        let mut app = app_with(&["api"], 80, 20);
        app.handle(AppEvent::SessionsListed(Err(RepoError::Spawn {
            command: "zmx list".to_string(),
            message: "No such file or directory".to_string(),
        })));
        let rows = draw(&mut app, 80, 20);
        assert!(rows[1].contains("Error: zmx list: No such file or directory"));
        assert!(rows[3].contains("Is zmx installed and in your PATH?"));
    }

    #[test]
    fn dashboard_shows_titles_rows_and_help() {
        let mut app = app_with(&["api", "notes"], 100, 20);
        app.handle(AppEvent::PreviewReady {
            name: "api".to_string(),
            content: "$ cargo run".to_string(),
        });
        let rows = draw(&mut app, 100, 20);

        assert!(rows[0].contains(" zmx sessions (2) "));
        assert!(rows[0].contains(" ↑ name "));
        assert!(rows[0].contains(" api "));
        assert!(rows[1].contains("▸ api"));
        assert!(rows[1].contains("$ cargo run"));
        assert!(rows[2].contains("notes"));
        assert!(rows.iter().any(|row| row.contains(" Activity Log ")));
        assert!(rows.iter().any(|row| row.contains("No activity yet.")));
        assert!(rows[19].contains("q quit") || rows[18].contains("q quit"));
    }

    #[test]
    fn filter_and_selection_show_in_list_chrome() {
        let mut app = app_with(&["api", "notes"], 100, 20);
        app.handle(AppEvent::Key(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE)));
        app.handle(AppEvent::Key(KeyEvent::new(KeyCode::Char('/'), KeyModifiers::NONE)));
        app.handle(AppEvent::Key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE)));
        app.handle(AppEvent::Key(KeyEvent::new(KeyCode::Char('p'), KeyModifiers::NONE)));
        let rows = draw(&mut app, 100, 20);

        assert!(rows[0].contains(" zmx (1/2) "));
        assert!(rows[1].contains("▸●api"));
        let bottom = &rows[main_content_height(20, 1) + 1];
        assert!(bottom.contains(" 1 sel "));
        assert!(rows.iter().any(|row| row.starts_with(" /ap█")));
    }

    #[test]
    fn cursor_row_stays_drawn_when_help_wraps() {
        let names: Vec<String> = (0..30).map(|idx| format!("s{idx:02}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut app = app_with(&refs, 80, 20);
        app.handle(AppEvent::Key(KeyEvent::new(KeyCode::End, KeyModifiers::NONE)));
        let rows = draw(&mut app, 80, 20);

        assert!(rows.iter().any(|row| row.contains("▸ s29")));
        assert!(rows[18].contains("q quit") || rows[19].contains("q quit"));
    }

    #[test]
    fn preview_keeps_newest_lines_when_taller_than_pane() {
        let mut app = app_with(&["api"], 100, 20);
        let content: Vec<String> = (0..15).map(|idx| format!("line{idx:02}")).collect();
        app.handle(AppEvent::PreviewReady {
            name: "api".to_string(),
            content: content.join("\n"),
        });
        let rows = draw(&mut app, 100, 20);

        assert!(rows.iter().any(|row| row.contains("line14")));
        assert!(!rows.iter().any(|row| row.contains("line00")));
    }

    #[test]
    fn confirm_prompt_names_single_target() {
        let mut app = app_with(&["api"], 100, 20);
        app.handle(AppEvent::Key(KeyEvent::new(KeyCode::Char('K'), KeyModifiers::NONE)));
        let rows = draw(&mut app, 100, 20);
        assert!(rows.iter().any(|row| row.contains(" Kill api? y/n ")));
    }
}
