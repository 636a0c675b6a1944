use crossterm::event::{KeyCode, KeyEvent};
use regex::Regex;

use crate::model::OrderId;
use crate::ops::search::search_orders;
use crate::store::{SelectionMeta, SelectionOrigin};
use crate::tui::app::{App, Focus, Mode};
use crate::util::unicode::pop_grapheme;

use super::*;

pub(super) fn handle_search(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char(c) => app.search_input.push(c),
        KeyCode::Backspace => pop_grapheme(&mut app.search_input),
        KeyCode::Enter => {
            app.mode = Mode::Navigate;
            if app.search_input.is_empty() {
                return;
            }
            app.last_search = Some(app.search_input.clone());
            app.search_match_idx = 0;
            jump_to_match(app);
        }
        KeyCode::Esc => {
            app.search_input.clear();
            app.mode = Mode::Navigate;
        }
        _ => {}
    }
}

/// Advance to the next matching stop (n)
pub(super) fn next_match(app: &mut App) {
    if app.last_search.is_none() {
        return;
    }
    app.search_match_idx += 1;
    jump_to_match(app);
}

/// Orders matching the pattern, once each, in board order
fn matching_orders(app: &App, re: &Regex) -> Vec<OrderId> {
    let mut ids: Vec<OrderId> = Vec::new();
    for hit in search_orders(app.routes(), re, None) {
        if !ids.contains(&hit.order_id) {
            ids.push(hit.order_id);
        }
    }
    ids
}

fn jump_to_match(app: &mut App) {
    let Some(pattern) = app.last_search.clone() else {
        return;
    };
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            report(app, format!("bad pattern: {}", e));
            return;
        }
    };
    let ids = matching_orders(app, &re);
    if ids.is_empty() {
        app.dash.notices.info(format!("no match for /{}", pattern));
        return;
    }
    let order_id = ids[app.search_match_idx % ids.len()];
    app.dash
        .select_order(order_id, SelectionMeta::quiet(SelectionOrigin::Search));
    app.focus = Focus::Stops;
    app.follow_store();
}
