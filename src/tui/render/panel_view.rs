use chrono::{Datelike, NaiveDate};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};

use crate::board::{OrderForm, Panel, RouteForm, RoutePicker};
use crate::model::{OrderId, RouteId};
use crate::tui::app::{App, Mode};

/// Render the panel on top of the stack. Panels below it stay hidden.
pub fn render_panel(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let Some(entry) = app.dash.panels.top() else {
        return;
    };

    let mut lines = vec![
        Line::from(Span::styled(
            format!(" {}", entry.payload.title()),
            Style::default()
                .fg(app.theme.text_bright)
                .bg(bg)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    match &entry.payload {
        Panel::RouteDetail { route_id } => route_detail(app, *route_id, &mut lines),
        Panel::OrderDetail { order_id } => order_detail(app, *order_id, &mut lines),
        Panel::RoutePicker(picker) => route_picker(app, picker, &mut lines),
        Panel::RouteForm(form) => route_form(app, form, &mut lines),
        Panel::OrderForm(form) => order_form(app, form, &mut lines),
        Panel::Calendar { month } => calendar(app, *month, &mut lines),
    }

    let paragraph = Paragraph::new(lines)
        .style(Style::default().bg(bg))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn field<'a>(app: &App, label: &str, value: impl Into<String>) -> Line<'a> {
    Line::from(vec![
        Span::styled(
            format!(" {:<9}", label),
            Style::default().fg(app.theme.dim).bg(app.theme.background),
        ),
        Span::styled(
            value.into(),
            Style::default().fg(app.theme.text).bg(app.theme.background),
        ),
    ])
}

fn missing<'a>(app: &App, what: &str) -> Line<'a> {
    Line::from(Span::styled(
        format!(" {} is gone", what),
        Style::default().fg(app.theme.red).bg(app.theme.background),
    ))
}

fn route_name(app: &App, route_id: RouteId) -> String {
    app.dash
        .store
        .find_route_by_id(route_id)
        .map_or_else(|| format!("#{}", route_id), |r| r.name.clone())
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "unscheduled".to_string(), |d| d.format("%a %d %b %Y").to_string())
}

fn route_detail(app: &App, route_id: RouteId, lines: &mut Vec<Line>) {
    let Some(route) = app.dash.store.find_route_by_id(route_id) else {
        lines.push(missing(app, "Route"));
        return;
    };
    lines.push(field(app, "Name", route.name.clone()));
    lines.push(field(app, "Date", format_date(route.delivery_date)));
    lines.push(field(
        app,
        "Driver",
        route
            .driver_id
            .map_or_else(|| "unassigned".to_string(), |d| format!("#{}", d)),
    ));
    lines.push(field(app, "Stops", route.counted_orders().to_string()));
    lines.push(field(app, "Items", route.counted_items().to_string()));

    let plans = route.saved_optimizations.as_ref().map_or(0, |p| p.len());
    if plans > 0 {
        let using = route
            .using_optimization_indx
            .map_or_else(|| "none".to_string(), |i| format!("{} of {}", i + 1, plans));
        lines.push(field(app, "Plan", using));
        if let Some(plan) = route.active_plan() {
            if let Some(km) = plan.total_distance_km {
                lines.push(field(app, "Distance", format!("{:.1} km", km)));
            }
            if let Some(min) = plan.total_duration_min {
                lines.push(field(app, "Duration", format!("{:.0} min", min)));
            }
        }
    }
}

fn order_detail(app: &App, order_id: OrderId, lines: &mut Vec<Line>) {
    let Some(order) = app.dash.store.find_order_by_id(order_id, None) else {
        lines.push(missing(app, "Order"));
        return;
    };
    lines.push(field(app, "Client", order.client_name.clone()));
    lines.push(field(app, "Route", route_name(app, order.route_id)));
    lines.push(field(app, "Stop", (order.delivery_arrangement + 1).to_string()));
    let address = order.address.one_line();
    if !address.is_empty() {
        lines.push(field(app, "Address", address));
    }
    if let Some(phone) = &order.contact.phone {
        lines.push(field(app, "Phone", phone.clone()));
    }
    if let Some(email) = &order.contact.email {
        lines.push(field(app, "Email", email.clone()));
    }
    if let Some(window) = &order.time_window {
        lines.push(field(
            app,
            "Window",
            format!("{}-{}", window.start.format("%H:%M"), window.end.format("%H:%M")),
        ));
    }
    if let Some(eta) = &order.expected_arrival_time {
        lines.push(field(app, "ETA", eta.clone()));
    }
    if let Some(notes) = &order.notes {
        lines.push(field(app, "Notes", notes.clone()));
    }
    if !order.delivery_items.is_empty() {
        lines.push(Line::from(""));
        for item in &order.delivery_items {
            let weight = item
                .weight_kg
                .map(|kg| format!("  {:.1} kg", kg))
                .unwrap_or_default();
            lines.push(Line::from(Span::styled(
                format!("   {}{}", item.name, weight),
                Style::default().fg(app.theme.text).bg(app.theme.background),
            )));
        }
    }
}

fn route_picker(app: &App, picker: &RoutePicker, lines: &mut Vec<Line>) {
    lines.push(field(app, "Day", format_date(Some(picker.date))));
    lines.push(Line::from(""));
    for (i, route_id) in picker.candidates.iter().enumerate() {
        let is_cursor = app.mode == Mode::Picker && i == app.picker_cursor;
        let style = if is_cursor {
            Style::default()
                .fg(app.theme.text_bright)
                .bg(app.theme.selection_bg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(app.theme.text).bg(app.theme.background)
        };
        let marker = if is_cursor { "\u{25B8}" } else { " " };
        lines.push(Line::from(Span::styled(
            format!(" {} {}", marker, route_name(app, *route_id)),
            style,
        )));
    }
}

fn route_form(app: &App, form: &RouteForm, lines: &mut Vec<Line>) {
    let editing = app.mode == Mode::Form;
    let name = if editing {
        format!("{}\u{258C}", app.form_input)
    } else {
        form.name.clone()
    };
    lines.push(field(app, "Name", name));
    lines.push(field(app, "Date", format_date(form.delivery_date)));
    if let Some(pending) = &form.on_complete {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" Order {} moves here once saved", pending.order_id),
            Style::default().fg(app.theme.cyan).bg(app.theme.background),
        )));
    }
}

fn order_form(app: &App, form: &OrderForm, lines: &mut Vec<Line>) {
    lines.push(field(app, "Client", form.client_name.clone()));
    lines.push(field(app, "Route", route_name(app, form.route_id)));
    let address = form.address.one_line();
    if !address.is_empty() {
        lines.push(field(app, "Address", address));
    }
    if !form.drafts.is_empty() {
        lines.push(field(app, "Staged", format!("{} item(s)", form.drafts.len())));
    }
}

fn calendar(app: &App, month: NaiveDate, lines: &mut Vec<Line>) {
    let theme = &app.theme;
    let bg = theme.background;
    let grid = app.dash.calendar(month);
    let cursor = (app.mode == Mode::Calendar).then_some(app.calendar_cursor);

    lines.push(Line::from(Span::styled(
        " Mo Tu We Th Fr Sa Su",
        Style::default().fg(theme.dim).bg(bg),
    )));
    for week in grid.weeks() {
        let mut spans = vec![Span::styled(" ", Style::default().bg(bg))];
        for (col, day) in week.iter().enumerate() {
            if col > 0 {
                spans.push(Span::styled(" ", Style::default().bg(bg)));
            }
            let Some(date) = day else {
                spans.push(Span::styled("  ", Style::default().bg(bg)));
                continue;
            };
            let busy = !grid.routes_on(*date).is_empty();
            let mut style = Style::default().fg(if busy { theme.cyan } else { theme.text });
            style = if cursor == Some(*date) {
                style.bg(theme.selection_bg).add_modifier(Modifier::BOLD)
            } else {
                style.bg(bg)
            };
            if busy {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            spans.push(Span::styled(format!("{:>2}", date.day()), style));
        }
        lines.push(Line::from(spans));
    }

    if let Some(date) = cursor {
        lines.push(Line::from(""));
        let on_day = grid.routes_on(date);
        if on_day.is_empty() {
            lines.push(Line::from(Span::styled(
                format!(" {}: no routes", date.format("%d %b")),
                Style::default().fg(theme.dim).bg(bg),
            )));
        }
        for route_id in on_day {
            lines.push(Line::from(Span::styled(
                format!(" {}", route_name(app, *route_id)),
                Style::default().fg(theme.text).bg(bg),
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::{render_to_string, seeded_app};
    use super::*;
    use crate::board::tests::day;
    use crate::store::{SelectionMeta, SelectionOrigin};

    fn panel_text(app: &App) -> String {
        render_to_string(30, 14, |frame, area| render_panel(frame, app, area))
    }

    #[test]
    fn route_detail_lists_counts() {
        let (_tmp, mut app) = seeded_app();
        app.select_cursor_route(true);
        let out = panel_text(&app);
        assert!(out.starts_with(" Route 1"));
        assert!(out.contains(" Name     North"));
        assert!(out.contains(" Stops    2"));
        assert!(out.contains(" Items    1"));
    }

    #[test]
    fn order_detail_shows_items() {
        let (_tmp, mut app) = seeded_app();
        app.dash
            .select_order(10, SelectionMeta::new(SelectionOrigin::List));
        let out = panel_text(&app);
        assert!(out.contains(" Client   Acme"));
        assert!(out.contains(" Route    North"));
        assert!(out.contains("Crate"));
    }

    #[test]
    fn calendar_lists_routes_of_cursor_day() {
        let (_tmp, mut app) = seeded_app();
        app.mode = Mode::Calendar;
        app.calendar_cursor = day(1);
        app.dash.open_panel(Panel::Calendar { month: day(1) });
        let out = panel_text(&app);
        assert!(out.starts_with(" March 2024"));
        assert!(out.contains(" Mo Tu We Th Fr Sa Su"));
        // 1 March 2024 is a Friday
        assert!(out.contains("              1  2  3"));
        assert!(out.contains(" North"));
        assert!(out.contains(" South"));
    }
}
