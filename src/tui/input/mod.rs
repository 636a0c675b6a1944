mod calendar;
mod form;
mod move_mode;
mod navigate;
mod search;
mod transfer;

use crossterm::event::{KeyCode, KeyEvent};

use crate::sync::NoticeLevel;

use super::app::{App, Mode};

use calendar::*;
use form::*;
use navigate::*;
use search::*;
use transfer::*;

pub use move_mode::{begin_move, cancel_move, handle_move};

/// Handle a key event in the current mode
pub fn handle_key(app: &mut App, key: KeyEvent) {
    // Ignore bare modifier key presses (Shift, Ctrl, Alt, etc.)
    if matches!(key.code, KeyCode::Modifier(_)) {
        return;
    }

    match app.mode {
        Mode::Navigate => handle_navigate(app, key),
        Mode::Move => handle_move(app, key),
        Mode::Transfer => handle_transfer(app, key),
        Mode::Calendar => handle_calendar(app, key),
        Mode::Picker => handle_picker(app, key),
        Mode::Form => handle_form(app, key),
        Mode::Search => handle_search(app, key),
    }
}

/// Show a local failure in the status row
fn report(app: &mut App, err: impl std::fmt::Display) {
    app.dash.notices.push(NoticeLevel::Error, err.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::render::test_helpers::seeded_app;
    use crossterm::event::KeyModifiers;
    use pretty_assertions::assert_eq;

    pub(super) fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
        app.pump();
    }

    pub(super) fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn quit_from_navigate() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn move_mode_reorders_and_persists() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('j')); // cursor on stop 11
        press(&mut app, KeyCode::Char('m'));
        assert_eq!(app.mode, Mode::Move);
        press(&mut app, KeyCode::Char('k')); // hover stop 10, upper half
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::Navigate);
        assert_eq!(app.cursor_stop_ids(), vec![11, 10]);
        assert_eq!(app.cursor_order().map(|o| o.id), Some(11));
        let saved = crate::io::dataset_io::read_dataset(app.dash.backend().dataset_path()).unwrap();
        let ids: Vec<_> = saved.routes[0].delivery_orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![11, 10]);
    }

    #[test]
    fn escape_cancels_move() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('m'));
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Navigate);
        assert!(app.move_state.is_none());
        assert_eq!(app.cursor_stop_ids(), vec![10, 11]);
    }

    #[test]
    fn transfer_mode_moves_stop_to_chosen_route() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('t'));
        assert_eq!(app.mode, Mode::Transfer);
        // First target skips the source route
        assert_eq!(app.transfer_state.map(|t| t.target), Some(1));
        press(&mut app, KeyCode::Char('j')); // West
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::Navigate);
        let west = app.dash.store.find_route_by_id(3).unwrap();
        assert_eq!(west.delivery_orders[0].id, 10);
        assert_eq!(west.total_orders, Some(1));
    }

    #[test]
    fn calendar_drop_on_busy_day_opens_picker() {
        let (_tmp, mut app) = seeded_app();
        // Stop 11 of North, dropped on 2 March where only West runs
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('C'));
        assert_eq!(app.mode, Mode::Calendar);
        app.calendar_cursor = crate::board::tests::day(2);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.dash.store.route_id_of_order(11), Some(3));

        // 1 March has North and South; from West both are candidates
        app.route_cursor = 2;
        app.stop_cursor = 0;
        press(&mut app, KeyCode::Char('C'));
        app.calendar_cursor = crate::board::tests::day(1);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Picker);
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Navigate);
        assert_eq!(app.dash.store.route_id_of_order(11), Some(2));
    }

    #[test]
    fn calendar_drop_on_empty_day_creates_route() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('C'));
        app.calendar_cursor = crate::board::tests::day(9);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Form);
        type_str(&mut app, "Late run");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::Navigate);
        let created = app
            .routes()
            .iter()
            .find(|r| r.name == "Late run")
            .expect("route created");
        assert_eq!(created.delivery_date, Some(crate::board::tests::day(9)));
        assert_eq!(created.delivery_orders[0].id, 10);
    }

    #[test]
    fn search_selects_matching_stop() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Char('/'));
        type_str(&mut app, "^20$");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Navigate);
        assert_eq!(app.cursor_order().map(|o| o.id), Some(20));
        assert_eq!(app.last_search.as_deref(), Some("^20$"));
    }

    #[test]
    fn bad_search_pattern_becomes_notice() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Char('/'));
        type_str(&mut app, "(");
        press(&mut app, KeyCode::Enter);
        let notice = app.dash.notices.latest().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
    }
}
