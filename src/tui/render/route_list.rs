use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::model::Route;
use crate::tui::app::{App, Focus, Mode};
use crate::util::unicode::{display_width, truncate_to_width};

use super::scroll_offset;

/// Render the route column: one line per route with date and counts
pub fn render_route_list(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let focused = app.focus == Focus::Routes && app.mode == Mode::Navigate;
    let border = if focused {
        app.theme.selection_border
    } else {
        app.theme.dim
    };
    let block = Block::default()
        .borders(Borders::RIGHT)
        .border_style(Style::default().fg(border).bg(bg))
        .title(Span::styled(
            " Routes ",
            Style::default().fg(app.theme.text).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let routes = app.routes();
    if routes.is_empty() {
        let hint = Line::from(Span::styled(
            " No routes (a to add)",
            Style::default().fg(app.theme.dim).bg(bg),
        ));
        frame.render_widget(Paragraph::new(hint).style(Style::default().bg(bg)), inner);
        return;
    }

    // Transfer mode points the cursor at the target instead
    let transfer_target = app.transfer_state.map(|t| (t.target, t.source_route_id));
    let cursor = transfer_target.map_or(app.route_cursor, |(target, _)| target);
    let height = inner.height as usize;
    let offset = scroll_offset(cursor, height);
    let selected = app.dash.store.selected_route_id();

    let lines: Vec<Line> = routes
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(i, route)| {
            let is_source = transfer_target.is_some_and(|(_, source)| source == route.id);
            route_line(
                app,
                route,
                i == cursor,
                selected == Some(route.id),
                is_source,
                inner.width as usize,
            )
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).style(Style::default().bg(bg)), inner);
}

fn route_line<'a>(
    app: &App,
    route: &Route,
    is_cursor: bool,
    is_selected: bool,
    is_source: bool,
    width: usize,
) -> Line<'a> {
    let theme = &app.theme;
    let row_bg = if is_cursor {
        theme.selection_bg
    } else {
        theme.background
    };
    let marker = if is_cursor { "\u{25B8}" } else { " " };
    let date = route
        .delivery_date
        .map(|d| d.format("%d %b").to_string())
        .unwrap_or_else(|| "--    ".to_string());
    let count = format!("{:>3}", route.counted_orders());

    // marker + space + date + 2 spaces + name + space + count
    let fixed = 1 + 1 + display_width(&date) + 2 + 1 + count.len();
    let name = truncate_to_width(&route.name, width.saturating_sub(fixed));
    let pad = width.saturating_sub(fixed + display_width(&name));

    let name_style = if is_source {
        Style::default().fg(theme.dim).bg(row_bg)
    } else if is_selected {
        Style::default()
            .fg(theme.text_bright)
            .bg(row_bg)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text).bg(row_bg)
    };

    Line::from(vec![
        Span::styled(marker, Style::default().fg(theme.highlight).bg(row_bg)),
        Span::styled(" ", Style::default().bg(row_bg)),
        Span::styled(date, Style::default().fg(theme.cyan).bg(row_bg)),
        Span::styled("  ", Style::default().bg(row_bg)),
        Span::styled(name, name_style),
        Span::styled(" ".repeat(pad + 1), Style::default().bg(row_bg)),
        Span::styled(count, Style::default().fg(theme.dim).bg(row_bg)),
    ])
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::{render_to_string, seeded_app};
    use super::*;
    use crate::tui::app::TransferState;

    #[test]
    fn lists_routes_with_dates_and_counts() {
        let (_tmp, app) = seeded_app();
        let out = render_to_string(30, 5, |frame, area| {
            render_route_list(frame, &app, area);
        });
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("Routes"));
        assert!(lines[1].starts_with("\u{25B8} 01 Mar  North"));
        assert!(lines[1].contains("  2"));
        assert!(lines[2].starts_with("  01 Mar  South"));
        assert!(lines[3].starts_with("  02 Mar  West"));
    }

    #[test]
    fn transfer_cursor_marks_target() {
        let (_tmp, mut app) = seeded_app();
        app.transfer_state = Some(TransferState {
            order_id: 10,
            source_route_id: 1,
            target: 2,
        });
        let out = render_to_string(30, 5, |frame, area| {
            render_route_list(frame, &app, area);
        });
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[1].starts_with("  01 Mar  North"));
        assert!(lines[3].starts_with("\u{25B8} 02 Mar  West"));
    }
}
