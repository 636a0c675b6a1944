use crossterm::event::{KeyCode, KeyEvent};

use crate::board::{Panel, panel};
use crate::ops::transfer::TransferRequest;
use crate::tui::app::{App, CalendarCarry, Mode, TransferState};

use super::*;

/// Start choosing another route for the stop under the cursor
pub(super) fn begin_transfer(app: &mut App) {
    let (Some(source_route_id), Some(order_id)) = (
        app.cursor_route().map(|r| r.id),
        app.cursor_order().map(|o| o.id),
    ) else {
        return;
    };
    let Some(target) = app.routes().iter().position(|r| r.id != source_route_id) else {
        app.dash.notices.info("no other route to move to");
        return;
    };
    app.transfer_state = Some(TransferState {
        order_id,
        source_route_id,
        target,
    });
    app.mode = Mode::Transfer;
}

pub(super) fn handle_transfer(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => step_target(app, 1),
        KeyCode::Char('k') | KeyCode::Up => step_target(app, -1),
        KeyCode::Enter => confirm_transfer(app),
        // Carry the stop to a calendar day instead
        KeyCode::Char('c') => {
            if let Some(ts) = app.transfer_state.take() {
                let carry = CalendarCarry::Order {
                    order_id: ts.order_id,
                    route_id: ts.source_route_id,
                };
                open_calendar(app, carry);
            }
        }
        KeyCode::Esc => {
            app.transfer_state = None;
            app.mode = Mode::Navigate;
        }
        _ => {}
    }
}

/// Move the target cursor, skipping the source route
fn step_target(app: &mut App, delta: isize) {
    let Some(ts) = app.transfer_state else {
        return;
    };
    let routes = app.routes();
    let mut next = ts.target;
    loop {
        let Some(candidate) = next.checked_add_signed(delta) else {
            return;
        };
        match routes.get(candidate) {
            None => return,
            Some(route) if route.id == ts.source_route_id => next = candidate,
            Some(_) => {
                next = candidate;
                break;
            }
        }
    }
    if let Some(ts) = &mut app.transfer_state {
        ts.target = next;
    }
}

fn confirm_transfer(app: &mut App) {
    let Some(ts) = app.transfer_state.take() else {
        return;
    };
    app.mode = Mode::Navigate;
    let Some(target_route_id) = app.routes().get(ts.target).map(|r| r.id) else {
        return;
    };
    let request = TransferRequest::new(ts.order_id, ts.source_route_id, target_route_id);
    if let Err(e) = app.dash.transfer(request) {
        report(app, e);
    }
    app.follow_store();
}

// ---------------------------------------------------------------------------
// Route picker
// ---------------------------------------------------------------------------

fn picker_candidates(app: &App) -> Vec<i64> {
    match app.dash.panels.find_by_key(panel::ROUTE_PICKER).map(|e| &e.payload) {
        Some(Panel::RoutePicker(picker)) => picker.candidates.clone(),
        _ => Vec::new(),
    }
}

pub(super) fn handle_picker(app: &mut App, key: KeyEvent) {
    let candidates = picker_candidates(app);
    if candidates.is_empty() {
        app.mode = Mode::Navigate;
        return;
    }
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            app.picker_cursor = (app.picker_cursor + 1).min(candidates.len() - 1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.picker_cursor = app.picker_cursor.saturating_sub(1);
        }
        KeyCode::Enter => {
            let target = candidates[app.picker_cursor.min(candidates.len() - 1)];
            app.mode = Mode::Navigate;
            if let Err(e) = app.dash.choose_route(target) {
                report(app, e);
            }
            app.follow_store();
        }
        KeyCode::Esc => {
            app.dash.panels.close_by_key(&[panel::ROUTE_PICKER]);
            app.mode = Mode::Navigate;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::press;
    use super::*;
    use crate::tui::render::test_helpers::seeded_app;
    use pretty_assertions::assert_eq;

    #[test]
    fn target_cursor_skips_source_route() {
        let (_tmp, mut app) = seeded_app();
        // Start from South (index 1): first target is North
        app.route_cursor = 1;
        app.select_cursor_route(false);
        press(&mut app, KeyCode::Char('t'));
        assert_eq!(app.transfer_state.map(|t| t.target), Some(0));
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.transfer_state.map(|t| t.target), Some(2));
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.transfer_state.map(|t| t.target), Some(2));
    }

    #[test]
    fn escape_leaves_routes_alone() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Char('t'));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Navigate);
        assert_eq!(app.dash.store.route_id_of_order(10), Some(1));
    }
}
