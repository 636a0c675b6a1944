use chrono::{Duration, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent};

use crate::board::{DateDropEffect, Panel, panel};
use crate::ops::calendar::{month_start, next_month, prev_month};
use crate::store::{SelectionMeta, SelectionOrigin};
use crate::tui::app::{App, CalendarCarry, Mode};
use crate::view::{DataTransfer, DragPayload, OrderTransfer, RouteTransfer};

use super::*;

/// Show the calendar panel; `carry` is what Enter will drop on a day
pub(super) fn open_calendar(app: &mut App, carry: CalendarCarry) {
    app.calendar_carry = carry;
    app.transfer_state = None;
    app.dash.reopen_panel(Panel::Calendar {
        month: month_start(app.calendar_cursor),
    });
    app.mode = Mode::Calendar;
}

pub(super) fn handle_calendar(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('h') | KeyCode::Left => shift(app, app.calendar_cursor - Duration::days(1)),
        KeyCode::Char('l') | KeyCode::Right => shift(app, app.calendar_cursor + Duration::days(1)),
        KeyCode::Char('k') | KeyCode::Up => shift(app, app.calendar_cursor - Duration::days(7)),
        KeyCode::Char('j') | KeyCode::Down => shift(app, app.calendar_cursor + Duration::days(7)),
        KeyCode::Char('[') => shift(app, prev_month(app.calendar_cursor)),
        KeyCode::Char(']') => shift(app, next_month(app.calendar_cursor)),
        KeyCode::Enter => drop_on_day(app),
        KeyCode::Esc => close_calendar(app),
        _ => {}
    }
}

/// Move the day cursor; the panel follows when the month changes
fn shift(app: &mut App, date: NaiveDate) {
    app.calendar_cursor = date;
    let month = month_start(date);
    if let Some(entry) = app.dash.panels.find_by_key_mut(panel::CALENDAR) {
        entry.payload = Panel::Calendar { month };
    }
}

fn close_calendar(app: &mut App) {
    app.dash.panels.close_by_key(&[panel::CALENDAR]);
    app.calendar_carry = CalendarCarry::Nothing;
    app.mode = Mode::Navigate;
}

fn drop_on_day(app: &mut App) {
    let date = app.calendar_cursor;
    let carry = app.calendar_carry;
    close_calendar(app);

    let payload = match carry {
        CalendarCarry::Nothing => {
            select_first_route_on(app, date);
            return;
        }
        CalendarCarry::Order { order_id, route_id } => {
            DragPayload::Order(OrderTransfer { order_id, route_id })
        }
        CalendarCarry::Route { route_id } => DragPayload::Route(RouteTransfer { route_id }),
    };
    let transfer = DataTransfer::with_payload(payload);
    match app.dash.drop_on_date(&transfer, date) {
        Ok(DateDropEffect::PickerOpened) => {
            app.picker_cursor = 0;
            app.mode = Mode::Picker;
        }
        Ok(DateDropEffect::FormOpened) => {
            app.form_input.clear();
            app.mode = Mode::Form;
        }
        Ok(DateDropEffect::Ignored) => {
            app.dash
                .notices
                .info(format!("already on {}", date.format("%d %b")));
        }
        Ok(DateDropEffect::Transferred(_) | DateDropEffect::RouteMoved(_)) => {}
        Err(e) => report(app, e),
    }
    app.follow_store();
}

fn select_first_route_on(app: &mut App, date: NaiveDate) {
    let Some(route_id) = app
        .routes()
        .iter()
        .find(|r| r.delivery_date == Some(date))
        .map(|r| r.id)
    else {
        return;
    };
    app.dash
        .select_route(route_id, SelectionMeta::new(SelectionOrigin::Calendar));
    app.follow_store();
}
