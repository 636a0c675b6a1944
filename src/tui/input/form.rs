use crossterm::event::{KeyCode, KeyEvent};

use crate::board::{BoardError, Panel, RouteForm, panel};
use crate::store::{SelectionMeta, SelectionOrigin};
use crate::tui::app::{App, Mode};
use crate::util::unicode::pop_grapheme;

use super::*;

fn open_form(app: &App) -> Option<RouteForm> {
    match app.dash.panels.find_by_key(panel::ROUTE_FORM).map(|e| &e.payload) {
        Some(Panel::RouteForm(form)) => Some(form.clone()),
        _ => None,
    }
}

/// Route name entry. Enter submits the form on the panel stack.
pub(super) fn handle_form(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char(c) => app.form_input.push(c),
        KeyCode::Backspace => pop_grapheme(&mut app.form_input),
        KeyCode::Enter => submit(app),
        KeyCode::Esc => {
            app.dash.panels.close_by_key(&[panel::ROUTE_FORM]);
            app.form_input.clear();
            app.mode = Mode::Navigate;
        }
        _ => {}
    }
}

fn submit(app: &mut App) {
    let Some(mut form) = open_form(app) else {
        app.mode = Mode::Navigate;
        return;
    };
    let name = app.form_input.trim();
    if name.is_empty() {
        report(app, "a route needs a name");
        return;
    }
    form.name = name.to_string();
    match app.dash.submit_route_form(&form) {
        Ok(submit) => {
            app.form_input.clear();
            app.mode = Mode::Navigate;
            if submit.transfer.is_none() {
                app.dash
                    .select_route(submit.route_id, SelectionMeta::quiet(SelectionOrigin::List));
            }
            app.follow_store();
        }
        // Backend failures already became a notice; stay in the form
        Err(BoardError::Api(_)) => {}
        Err(e) => report(app, e),
    }
}
