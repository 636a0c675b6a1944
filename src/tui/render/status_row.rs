use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::app::{App, CalendarCarry, Mode};
use crate::util::unicode::display_width;

/// Render the status row (bottom of screen)
pub fn render_status_row(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let width = area.width as usize;

    let (mut spans, hint) = match app.mode {
        Mode::Navigate => navigate_status(app),
        Mode::Search => (
            vec![
                Span::styled(
                    format!("/{}", app.search_input),
                    Style::default().fg(app.theme.text_bright).bg(bg),
                ),
                Span::styled("\u{258C}", Style::default().fg(app.theme.highlight).bg(bg)),
            ],
            "Enter search  Esc cancel",
        ),
        Mode::Move => (
            vec![mode_label(app, "MOVE")],
            "j/k target  g/G ends  Enter drop  Esc cancel",
        ),
        Mode::Transfer => {
            let target = app
                .transfer_state
                .and_then(|t| app.routes().get(t.target))
                .map(|r| r.name.clone())
                .unwrap_or_default();
            (
                vec![
                    mode_label(app, "TO"),
                    Span::styled(
                        format!(" {}", target),
                        Style::default().fg(app.theme.text_bright).bg(bg),
                    ),
                ],
                "j/k route  Enter move  c day  Esc cancel",
            )
        }
        Mode::Calendar => {
            let carrying = match app.calendar_carry {
                CalendarCarry::Nothing => String::new(),
                CalendarCarry::Order { order_id, .. } => format!(" order {}", order_id),
                CalendarCarry::Route { route_id } => format!(" route {}", route_id),
            };
            (
                vec![
                    mode_label(app, "DAY"),
                    Span::styled(
                        format!(" {}{}", app.calendar_cursor.format("%a %d %b"), carrying),
                        Style::default().fg(app.theme.text_bright).bg(bg),
                    ),
                ],
                "hjkl day  [ ] month  Enter drop  Esc close",
            )
        }
        Mode::Picker => (vec![mode_label(app, "PICK")], "j/k route  Enter move  Esc cancel"),
        Mode::Form => (vec![mode_label(app, "FORM")], "Enter save  Esc cancel"),
    };

    let content_width: usize = spans.iter().map(|s| display_width(&s.content)).sum();
    let hint_width = display_width(hint);
    if !hint.is_empty() && content_width + hint_width < width {
        spans.push(Span::styled(
            " ".repeat(width - content_width - hint_width),
            Style::default().bg(bg),
        ));
        spans.push(Span::styled(hint, Style::default().fg(app.theme.dim).bg(bg)));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
}

fn mode_label<'a>(app: &App, label: &'a str) -> Span<'a> {
    Span::styled(
        format!(" {} ", label),
        Style::default()
            .fg(app.theme.background)
            .bg(app.theme.highlight)
            .add_modifier(Modifier::BOLD),
    )
}

/// Navigate mode: the latest notice wins, then the active search, then key hints
fn navigate_status<'a>(app: &App) -> (Vec<Span<'a>>, &'static str) {
    let bg = app.theme.background;
    if let Some(notice) = app.dash.notices.latest() {
        let hint = if app.dash.notices.has_sync_failures() {
            "r retry  x dismiss"
        } else {
            "x dismiss"
        };
        return (
            vec![Span::styled(
                notice.text.clone(),
                Style::default()
                    .fg(app.theme.notice_color(notice.level))
                    .bg(bg),
            )],
            hint,
        );
    }
    if let Some(pattern) = &app.last_search {
        return (
            vec![Span::styled(
                format!("/{}", pattern),
                Style::default().fg(app.theme.dim).bg(bg),
            )],
            "n next",
        );
    }
    let hint = if app.show_key_hints {
        "m move  t transfer  c calendar  a add  / search  q quit"
    } else {
        ""
    };
    (Vec::new(), hint)
}
