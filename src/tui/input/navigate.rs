use crossterm::event::{KeyCode, KeyEvent};

use crate::board::RouteForm;
use crate::tui::app::{App, CalendarCarry, Focus, Mode};

use super::*;

pub(super) fn handle_navigate(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Cursor
        KeyCode::Char('j') | KeyCode::Down => move_cursor(app, 1),
        KeyCode::Char('k') | KeyCode::Up => move_cursor(app, -1),
        KeyCode::Tab | KeyCode::Char('l') | KeyCode::Right => app.focus = Focus::Stops,
        KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Left => app.focus = Focus::Routes,
        KeyCode::Enter => match app.focus {
            Focus::Routes => app.select_cursor_route(true),
            Focus::Stops => app.select_cursor_order(true),
        },
        KeyCode::Esc => close_top_panel(app),

        // Drag flows
        KeyCode::Char('m') => {
            app.focus = Focus::Stops;
            begin_move(app);
        }
        KeyCode::Char('t') => begin_transfer(app),
        KeyCode::Char('c') => open_calendar(app, CalendarCarry::Nothing),
        KeyCode::Char('C') => {
            if let (Some(route), Some(order)) = (app.cursor_route(), app.cursor_order()) {
                let carry = CalendarCarry::Order {
                    order_id: order.id,
                    route_id: route.id,
                };
                open_calendar(app, carry);
            }
        }
        KeyCode::Char('D') => {
            if let Some(route) = app.cursor_route() {
                let carry = CalendarCarry::Route { route_id: route.id };
                open_calendar(app, carry);
            }
        }
        KeyCode::Char('p') => apply_next_plan(app),

        // Forms
        KeyCode::Char('a') => {
            app.dash.open_route_form(RouteForm::create());
            app.form_input.clear();
            app.mode = Mode::Form;
        }
        KeyCode::Char('e') => {
            if let Some(route) = app.cursor_route() {
                let form = RouteForm::edit(route);
                app.form_input = form.name.clone();
                app.dash.open_route_form(form);
                app.mode = Mode::Form;
            }
        }

        // Notices
        KeyCode::Char('r') => {
            app.dash.retry_failed();
        }
        KeyCode::Char('x') => {
            app.dash.notices.dismiss();
        }

        // Search
        KeyCode::Char('/') => {
            app.search_input.clear();
            app.mode = Mode::Search;
        }
        KeyCode::Char('n') => next_match(app),
        _ => {}
    }
}

fn move_cursor(app: &mut App, delta: isize) {
    match app.focus {
        Focus::Routes => {
            let len = app.routes().len();
            if len == 0 {
                return;
            }
            let next = app.route_cursor.saturating_add_signed(delta).min(len - 1);
            if next != app.route_cursor {
                app.route_cursor = next;
                app.select_cursor_route(false);
            }
        }
        Focus::Stops => {
            let len = app.cursor_stop_ids().len();
            if len == 0 {
                return;
            }
            let next = app.stop_cursor.saturating_add_signed(delta).min(len - 1);
            if next != app.stop_cursor {
                app.stop_cursor = next;
                app.select_cursor_order(false);
            }
        }
    }
}

fn close_top_panel(app: &mut App) {
    if let Some(id) = app.dash.panels.top().map(|entry| entry.id) {
        app.dash.close_panel(id);
    }
}

/// Cycle the route under the cursor to its next saved plan
fn apply_next_plan(app: &mut App) {
    let Some(route) = app.cursor_route() else {
        return;
    };
    let (route_id, name) = (route.id, route.name.clone());
    let count = route.saved_optimizations.as_ref().map_or(0, |p| p.len());
    let current = route.using_optimization_indx;
    if count == 0 {
        app.dash.notices.info(format!("{} has no saved plans", name));
        return;
    }
    let index = current.map_or(0, |i| (i + 1) % count);
    if let Err(e) = app.dash.apply_plan(route_id, index) {
        report(app, e);
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::press;
    use super::*;
    use crate::board::panel;
    use crate::tui::render::test_helpers::seeded_app;
    use pretty_assertions::assert_eq;

    #[test]
    fn cursor_selects_routes_and_first_stop() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.dash.store.selected_route_id(), Some(2));
        assert_eq!(app.dash.store.selected_order_id(), Some(20));
        press(&mut app, KeyCode::Char('j'));
        // West has no stops: order selection clears
        assert_eq!(app.dash.store.selected_order_id(), None);
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.route_cursor, 2);
    }

    #[test]
    fn enter_opens_detail_and_escape_closes_it() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Enter);
        assert!(app.dash.panels.has_key(panel::ROUTE_DETAIL));
        press(&mut app, KeyCode::Esc);
        assert!(!app.dash.panels.has_key(panel::ROUTE_DETAIL));
    }

    #[test]
    fn plan_key_without_plans_is_a_notice() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Char('p'));
        assert_eq!(
            app.dash.notices.latest().map(|n| n.text.as_str()),
            Some("North has no saved plans")
        );
    }

    #[test]
    fn edit_form_renames_route() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.mode, Mode::Form);
        assert_eq!(app.form_input, "North");
        press(&mut app, KeyCode::Char('!'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.routes()[0].name, "North!");
        assert!(!app.dash.panels.has_key(panel::ROUTE_FORM));
    }
}
