use std::ops::Range;

use regex::Regex;
use serde::Serialize;

use crate::model::{Order, OrderId, Route, RouteId};

/// Which field of an order matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Id,
    ClientName,
    Address,
    Contact,
    Notes,
    /// One of the order's item names
    Item,
}

/// A search hit for one order field
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub route_id: RouteId,
    pub order_id: OrderId,
    pub field: MatchField,
    /// The text the pattern ran against
    pub text: String,
    pub spans: Vec<Range<usize>>,
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Search orders across routes, optionally limited to one route.
pub fn search_orders(routes: &[Route], re: &Regex, route_filter: Option<RouteId>) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for route in routes {
        if route_filter.is_some_and(|id| id != route.id) {
            continue;
        }
        for order in &route.delivery_orders {
            search_order(re, route.id, order, &mut hits);
        }
    }
    hits
}

fn search_order(re: &Regex, route_id: RouteId, order: &Order, hits: &mut Vec<SearchHit>) {
    let mut check = |field: MatchField, text: String| {
        let spans = find_matches(re, &text);
        if !spans.is_empty() {
            hits.push(SearchHit {
                route_id,
                order_id: order.id,
                field,
                text,
                spans,
            });
        }
    };

    check(MatchField::Id, order.id.to_string());
    check(MatchField::ClientName, order.client_name.clone());
    check(MatchField::Address, order.address.one_line());
    let contact: Vec<&str> = [&order.contact.phone, &order.contact.email]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();
    if !contact.is_empty() {
        check(MatchField::Contact, contact.join(" "));
    }
    if let Some(notes) = &order.notes {
        check(MatchField::Notes, notes.clone());
    }
    for item in &order.delivery_items {
        check(MatchField::Item, item.name.clone());
    }
}
