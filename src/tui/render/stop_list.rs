use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use regex::Regex;

use crate::model::{Order, OrderId, Route};
use crate::ops::reorder::DropPosition;
use crate::tui::app::{App, Focus, Mode};
use crate::util::unicode::{display_width, truncate_to_width};

use super::{push_highlighted_spans, scroll_offset, search_regex};

/// One row of the stop column
enum Row<'r> {
    Stop { index: usize, order: &'r Order },
    /// Where the dragged stop would land
    DropMarker,
}

/// Render the stops of the route under the cursor
pub fn render_stop_list(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let focused = app.focus == Focus::Stops && matches!(app.mode, Mode::Navigate | Mode::Move);
    let title = match app.cursor_route() {
        Some(route) => format!(" {} ", route.name),
        None => " Stops ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::RIGHT)
        .border_style(Style::default().fg(if focused {
            app.theme.selection_border
        } else {
            app.theme.dim
        }))
        .title(Span::styled(
            title,
            Style::default().fg(app.theme.text).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(route) = app.cursor_route() else {
        return;
    };
    if route.delivery_orders.is_empty() {
        let hint = Line::from(Span::styled(
            " No stops",
            Style::default().fg(app.theme.dim).bg(bg),
        ));
        frame.render_widget(Paragraph::new(hint).style(Style::default().bg(bg)), inner);
        return;
    }

    let rows = build_rows(app, route);
    let cursor_row = cursor_row(app, &rows);
    let height = inner.height as usize;
    let offset = scroll_offset(cursor_row, height);
    let search_re = search_regex(app);
    let dragging = app
        .move_state
        .as_ref()
        .and_then(|ms| ms.engine.dragging_id());

    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(i, row)| match row {
            Row::Stop { index, order } => stop_line(
                app,
                *index,
                order,
                i == cursor_row,
                dragging == Some(order.id),
                inner.width as usize,
                search_re.as_ref(),
            ),
            Row::DropMarker => Line::from(Span::styled(
                "\u{2500}".repeat(inner.width as usize),
                Style::default().fg(app.theme.drop_marker).bg(bg),
            )),
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).style(Style::default().bg(bg)), inner);
}

/// Stops in display order. While dragging, that is the drag's own view of
/// the route plus the drop marker.
fn build_rows<'r>(app: &App, route: &'r Route) -> Vec<Row<'r>> {
    let Some(ms) = &app.move_state else {
        return route
            .delivery_orders
            .iter()
            .enumerate()
            .map(|(index, order)| Row::Stop { index, order })
            .collect();
    };

    let indicator = ms.engine.indicator();
    let mut rows = Vec::new();
    let ids: &[OrderId] = ms.engine.orders();
    for (index, id) in ids.iter().enumerate() {
        let Some(order) = route.order(*id) else {
            continue;
        };
        let marked = indicator.filter(|ind| ind.target_id == *id);
        if marked.is_some_and(|ind| ind.position == DropPosition::Before) {
            rows.push(Row::DropMarker);
        }
        rows.push(Row::Stop { index, order });
        if marked.is_some_and(|ind| ind.position == DropPosition::After) {
            rows.push(Row::DropMarker);
        }
    }
    rows
}

fn cursor_row(app: &App, rows: &[Row]) -> usize {
    let target = app
        .move_state
        .as_ref()
        .map_or(app.stop_cursor, |ms| ms.target);
    rows.iter()
        .position(|row| matches!(row, Row::Stop { index, .. } if *index == target))
        .unwrap_or(0)
}

fn stop_line<'a>(
    app: &App,
    index: usize,
    order: &Order,
    is_cursor: bool,
    is_dragged: bool,
    width: usize,
    search_re: Option<&Regex>,
) -> Line<'a> {
    let theme = &app.theme;
    let row_bg = if is_cursor && app.focus == Focus::Stops {
        theme.selection_bg
    } else {
        theme.background
    };
    let base = if is_dragged {
        Style::default()
            .fg(theme.highlight)
            .bg(row_bg)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text).bg(row_bg)
    };
    let hl = Style::default()
        .fg(theme.background)
        .bg(theme.highlight)
        .add_modifier(Modifier::BOLD);

    let number = format!("{:>3}. ", index + 1);
    let items = match order.item_count() {
        0 => String::new(),
        n => format!(" {}\u{00D7}", n),
    };
    let eta = order
        .expected_arrival_time
        .as_deref()
        .map(|t| format!(" {}", t))
        .unwrap_or_default();

    let room = width.saturating_sub(display_width(&number) + display_width(&items) + display_width(&eta));
    let client = truncate_to_width(&order.client_name, room);
    let address = truncate_to_width(
        &order.address.one_line(),
        room.saturating_sub(display_width(&client) + 2),
    );

    let mut spans = vec![Span::styled(number, Style::default().fg(theme.dim).bg(row_bg))];
    push_highlighted_spans(&mut spans, &client, base, hl, search_re);
    if !address.is_empty() {
        spans.push(Span::styled("  ", Style::default().bg(row_bg)));
        spans.push(Span::styled(address, Style::default().fg(theme.dim).bg(row_bg)));
    }
    let used: usize = spans.iter().map(|s| display_width(&s.content)).sum();
    let pad = width.saturating_sub(used + display_width(&items) + display_width(&eta));
    spans.push(Span::styled(" ".repeat(pad), Style::default().bg(row_bg)));
    spans.push(Span::styled(eta, Style::default().fg(theme.cyan).bg(row_bg)));
    spans.push(Span::styled(items, Style::default().fg(theme.yellow).bg(row_bg)));
    Line::from(spans)
}
