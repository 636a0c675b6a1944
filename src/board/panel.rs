use chrono::NaiveDate;
use serde::Serialize;

use crate::board::forms::{OrderForm, RouteForm};
use crate::model::{OrderId, RouteId};

pub const ROUTE_DETAIL: &str = "route-detail";
pub const ORDER_DETAIL: &str = "order-detail";
pub const ROUTE_PICKER: &str = "route-picker";
pub const ROUTE_FORM: &str = "route-form";
pub const ORDER_FORM: &str = "order-form";
pub const CALENDAR: &str = "calendar";

/// What a side panel shows
#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
    RouteDetail { route_id: RouteId },
    OrderDetail { order_id: OrderId },
    /// Several routes run on the day an order was dropped on
    RoutePicker(RoutePicker),
    RouteForm(RouteForm),
    OrderForm(OrderForm),
    Calendar { month: NaiveDate },
}

impl Panel {
    /// Stack key; at most one panel per key is expected open
    pub fn key(&self) -> &'static str {
        match self {
            Panel::RouteDetail { .. } => ROUTE_DETAIL,
            Panel::OrderDetail { .. } => ORDER_DETAIL,
            Panel::RoutePicker(_) => ROUTE_PICKER,
            Panel::RouteForm(_) => ROUTE_FORM,
            Panel::OrderForm(_) => ORDER_FORM,
            Panel::Calendar { .. } => CALENDAR,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Panel::RouteDetail { route_id } => format!("Route {}", route_id),
            Panel::OrderDetail { order_id } => format!("Order {}", order_id),
            Panel::RoutePicker(p) => format!("Move order {} to…", p.order_id),
            Panel::RouteForm(f) => match f.route_id {
                Some(id) => format!("Edit route {}", id),
                None => "New route".to_string(),
            },
            Panel::OrderForm(f) => match f.order_id {
                Some(id) => format!("Edit order {}", id),
                None => "New order".to_string(),
            },
            Panel::Calendar { month } => month.format("%B %Y").to_string(),
        }
    }
}

/// Candidate routes for an order dropped on a busy day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutePicker {
    pub order_id: OrderId,
    pub source_route_id: RouteId,
    pub date: NaiveDate,
    pub candidates: Vec<RouteId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_and_titles() {
        let panel = Panel::RouteDetail { route_id: 3 };
        assert_eq!(panel.key(), ROUTE_DETAIL);
        assert_eq!(panel.title(), "Route 3");
        let cal = Panel::Calendar {
            month: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        assert_eq!(cal.title(), "March 2024");
        assert_eq!(Panel::RouteForm(RouteForm::create()).title(), "New route");
    }
}
