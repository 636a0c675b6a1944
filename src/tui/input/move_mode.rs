use crossterm::event::{KeyCode, KeyEvent};
use tracing::debug;

use crate::model::RouteId;
use crate::ops::reorder::{CardBounds, DragReorderEngine, DropOutcome};
use crate::tui::app::{App, Mode, MoveState};
use crate::view::DataTransfer;

use super::*;

/// Pick up the stop under the cursor
pub fn begin_move(app: &mut App) {
    let (Some(route_id), Some(order_id)) = (
        app.cursor_route().map(|r| r.id),
        app.cursor_order().map(|o| o.id),
    ) else {
        return;
    };
    let mut engine = DragReorderEngine::new(route_id, app.cursor_stop_ids());
    let mut transfer = DataTransfer::new();
    if !engine.handle_drag_start(order_id, &mut transfer) {
        return;
    }
    app.move_state = Some(MoveState {
        engine,
        transfer,
        target: app.stop_cursor,
        origin: app.stop_cursor,
    });
    app.mode = Mode::Move;
}

pub fn handle_move(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => step(app, 1),
        KeyCode::Char('k') | KeyCode::Up => step(app, -1),
        KeyCode::Char('g') | KeyCode::Home => jump(app, 0),
        KeyCode::Char('G') | KeyCode::End => drop_at_end(app),
        KeyCode::Enter => drop_on_target(app),
        KeyCode::Esc => cancel_move(app),
        _ => {}
    }
}

/// Put the stop back where it was. Input held back during the drag lands now.
pub fn cancel_move(app: &mut App) {
    if let Some(mut ms) = app.move_state.take() {
        ms.engine.handle_drag_end();
    }
    app.mode = Mode::Navigate;
    app.follow_store();
}

fn step(app: &mut App, delta: isize) {
    let Some(ms) = &app.move_state else {
        return;
    };
    let target = ms.target.saturating_add_signed(delta);
    jump(app, target);
}

fn jump(app: &mut App, target: usize) {
    let Some(ms) = &mut app.move_state else {
        return;
    };
    let len = ms.engine.orders().len();
    if len == 0 {
        return;
    }
    ms.target = target.min(len - 1);
    hover(ms);
}

/// Each card is one row. Moving down, the pointer sits in the lower half of
/// the hovered card; moving up, in the upper half.
fn hover(ms: &mut MoveState) {
    let Some(&target_id) = ms.engine.orders().get(ms.target) else {
        return;
    };
    let top = ms.target as f64;
    let pointer_y = if ms.target > ms.origin { top + 0.75 } else { top + 0.25 };
    ms.engine
        .handle_drag_over_card(target_id, pointer_y, CardBounds::new(top, 1.0));
}

fn drop_on_target(app: &mut App) {
    let Some(mut ms) = app.move_state.take() else {
        return;
    };
    let outcome = match ms.engine.orders().get(ms.target).copied() {
        Some(target_id) => ms.engine.handle_drop_on_card(target_id),
        None => ms.engine.handle_drop_at_end(),
    };
    finish(app, ms.engine.route_id(), outcome);
}

fn drop_at_end(app: &mut App) {
    let Some(mut ms) = app.move_state.take() else {
        return;
    };
    let outcome = ms.engine.handle_drop_at_end();
    finish(app, ms.engine.route_id(), outcome);
}

fn finish(app: &mut App, route_id: RouteId, outcome: DropOutcome) {
    app.mode = Mode::Navigate;
    debug!(route_id, ?outcome, "move mode drop");
    if let Err(e) = app.dash.handle_drop(route_id, outcome) {
        report(app, e);
    }
    app.follow_store();
}

#[cfg(test)]
mod tests {
    use super::super::tests::press;
    use super::*;
    use crate::ops::reorder::DropPosition;
    use crate::tui::render::test_helpers::seeded_app;
    use pretty_assertions::assert_eq;

    #[test]
    fn indicator_follows_direction() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('m'));
        press(&mut app, KeyCode::Char('j'));
        let ind = app.move_state.as_ref().unwrap().engine.indicator().unwrap();
        assert_eq!(ind.target_id, 11);
        assert_eq!(ind.position, DropPosition::After);

        // Back over itself: no indicator
        press(&mut app, KeyCode::Char('k'));
        assert!(app.move_state.as_ref().unwrap().engine.indicator().is_none());
    }

    #[test]
    fn drop_at_end_moves_stop_last() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('m'));
        press(&mut app, KeyCode::Char('G'));
        assert_eq!(app.cursor_stop_ids(), vec![11, 10]);
        let saved = crate::io::dataset_io::read_dataset(app.dash.backend().dataset_path()).unwrap();
        assert_eq!(saved.routes[0].delivery_orders[1].id, 10);
    }

    #[test]
    fn drop_in_place_sends_nothing() {
        let (_tmp, mut app) = seeded_app();
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('m'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Navigate);
        assert!(app.dash.notices.is_empty());
        assert_eq!(app.cursor_stop_ids(), vec![10, 11]);
    }
}
