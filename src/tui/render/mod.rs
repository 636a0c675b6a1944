pub mod panel_view;
pub mod route_list;
pub mod status_row;
pub mod stop_list;

#[cfg(test)]
pub mod test_helpers;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};
use regex::Regex;

use super::app::App;

/// Main render function, dispatches to sub-renderers
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let bg_style = Style::default().bg(app.theme.background);
    frame.render_widget(Block::default().style(bg_style), area);

    // Layout: header (1 row) | content | status row (1 row)
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(frame, app, chunks[0]);

    // Routes | stops | side panel (only while one is open)
    let columns = if app.dash.panels.is_empty() {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(chunks[1])
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(30),
                Constraint::Percentage(38),
                Constraint::Percentage(32),
            ])
            .split(chunks[1])
    };

    route_list::render_route_list(frame, app, columns[0]);
    stop_list::render_stop_list(frame, app, columns[1]);
    if columns.len() > 2 {
        panel_view::render_panel(frame, app, columns[2]);
    }

    status_row::render_status_row(frame, app, chunks[2]);
}

/// Project name on the left, sync state on the right
fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let width = area.width as usize;
    let mut spans = vec![Span::styled(
        format!(" {}", app.project_name),
        Style::default()
            .fg(app.theme.text_bright)
            .bg(bg)
            .add_modifier(Modifier::BOLD),
    )];

    let failed = app.dash.sync.failed().len();
    let (state, color) = if failed > 0 {
        (format!("{} failed (r retry) ", failed), app.theme.yellow)
    } else if app.dash.sync.is_idle() {
        ("saved ".to_string(), app.theme.dim)
    } else {
        (
            format!("syncing {} ", app.dash.sync.pending_len()),
            app.theme.cyan,
        )
    };
    let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    let state_width = state.chars().count();
    if used + state_width < width {
        spans.push(Span::styled(
            " ".repeat(width - used - state_width),
            Style::default().bg(bg),
        ));
        spans.push(Span::styled(state, Style::default().fg(color).bg(bg)));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(bg)),
        area,
    );
}

/// First row to draw so that `cursor` stays inside a window of `height` rows
pub(super) fn scroll_offset(cursor: usize, height: usize) -> usize {
    if height == 0 {
        return 0;
    }
    cursor.saturating_sub(height - 1)
}

/// Push spans for text with regex match highlighting. If no regex or no matches,
/// pushes a single span with `base_style`. Otherwise splits text at match boundaries.
pub(super) fn push_highlighted_spans<'a>(
    spans: &mut Vec<Span<'a>>,
    text: &str,
    base_style: Style,
    highlight_style: Style,
    search_re: Option<&Regex>,
) {
    let Some(re) = search_re else {
        spans.push(Span::styled(text.to_string(), base_style));
        return;
    };

    let mut last_end = 0;
    for m in re.find_iter(text) {
        if m.start() > last_end {
            spans.push(Span::styled(
                text[last_end..m.start()].to_string(),
                base_style,
            ));
        }
        spans.push(Span::styled(
            text[m.start()..m.end()].to_string(),
            highlight_style,
        ));
        last_end = m.end();
    }
    if last_end < text.len() {
        spans.push(Span::styled(text[last_end..].to_string(), base_style));
    }
}

/// The active search as a compiled regex, if it compiles
pub(super) fn search_regex(app: &App) -> Option<Regex> {
    app.last_search.as_deref().and_then(|p| Regex::new(p).ok())
}
