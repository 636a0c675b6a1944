use serde::Serialize;

use crate::model::{OptionMaps, Order, OrderId, Route, RouteId, RoutePlan};
use crate::ops::calendar::CalendarMonth;
use crate::ops::check::{CheckError, CheckResult, CheckWarning};
use crate::ops::search::{MatchField, SearchHit};
use crate::sync::{SyncOutcome, Ticket};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct RouteSummaryJson {
    pub id: RouteId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,
    pub driver: String,
    pub total_orders: usize,
    pub total_items: usize,
}

#[derive(Serialize)]
pub struct StopJson {
    pub id: OrderId,
    pub arrangement: usize,
    pub client_name: String,
    pub address: String,
    pub items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_arrival_time: Option<String>,
}

#[derive(Serialize)]
pub struct RouteDetailJson {
    #[serde(flatten)]
    pub summary: RouteSummaryJson,
    pub stops: Vec<StopJson>,
}

#[derive(Serialize)]
pub struct CalendarDayJson {
    pub date: String,
    pub routes: Vec<RouteId>,
}

#[derive(Serialize)]
pub struct SearchHitJson {
    pub route_id: RouteId,
    pub order_id: OrderId,
    pub client_name: String,
    pub field: MatchField,
    pub text: String,
}

#[derive(Serialize)]
pub struct PlanJson {
    pub index: usize,
    pub stops: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration_min: Option<f64>,
    pub active: bool,
}

/// Result of a write command once its background write resolved
#[derive(Serialize)]
pub struct SyncResultJson {
    pub ticket: Ticket,
    pub flow: &'static str,
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub rolled_back: bool,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn route_to_json(route: &Route, options: &OptionMaps) -> RouteSummaryJson {
    RouteSummaryJson {
        id: route.id,
        name: route.name.clone(),
        delivery_date: route.delivery_date.map(|d| d.format("%Y-%m-%d").to_string()),
        driver: options.driver_name(route.driver_id).to_string(),
        total_orders: route.total_orders.unwrap_or_else(|| route.counted_orders()),
        total_items: route.total_items.unwrap_or_else(|| route.counted_items()),
    }
}

pub fn stop_to_json(order: &Order) -> StopJson {
    StopJson {
        id: order.id,
        arrangement: order.delivery_arrangement,
        client_name: order.client_name.clone(),
        address: order.address.one_line(),
        items: order.item_count(),
        expected_arrival_time: order.expected_arrival_time.clone(),
    }
}

pub fn route_detail_to_json(route: &Route, options: &OptionMaps) -> RouteDetailJson {
    RouteDetailJson {
        summary: route_to_json(route, options),
        stops: route.delivery_orders.iter().map(stop_to_json).collect(),
    }
}

pub fn calendar_to_json(calendar: &CalendarMonth) -> Vec<CalendarDayJson> {
    calendar
        .days
        .iter()
        .map(|(date, routes)| CalendarDayJson {
            date: date.format("%Y-%m-%d").to_string(),
            routes: routes.clone(),
        })
        .collect()
}

pub fn hit_to_json(hit: &SearchHit, routes: &[Route]) -> SearchHitJson {
    let client_name = routes
        .iter()
        .find(|r| r.id == hit.route_id)
        .and_then(|r| r.order(hit.order_id))
        .map(|o| o.client_name.clone())
        .unwrap_or_default();
    SearchHitJson {
        route_id: hit.route_id,
        order_id: hit.order_id,
        client_name,
        field: hit.field,
        text: hit.text.clone(),
    }
}

pub fn plans_to_json(route: &Route) -> Vec<PlanJson> {
    let Some(plans) = &route.saved_optimizations else {
        return Vec::new();
    };
    plans
        .iter()
        .enumerate()
        .map(|(index, plan)| PlanJson {
            index,
            stops: plan.order_sequence.len(),
            total_distance_km: plan.total_distance_km,
            total_duration_min: plan.total_duration_min,
            active: route.using_optimization_indx == Some(index),
        })
        .collect()
}

pub fn sync_to_json(outcome: &SyncOutcome) -> SyncResultJson {
    match outcome {
        SyncOutcome::Confirmed { ticket, kind } => SyncResultJson {
            ticket: *ticket,
            flow: kind.label(),
            saved: true,
            error: None,
            rolled_back: false,
        },
        SyncOutcome::Failed {
            ticket,
            kind,
            error,
            rolled_back,
        } => SyncResultJson {
            ticket: *ticket,
            flow: kind.label(),
            saved: false,
            error: Some(error.to_string()),
            rolled_back: *rolled_back,
        },
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// One line per route: id, day, name, counters and driver
pub fn format_route_line(route: &Route, options: &OptionMaps) -> String {
    let date = route
        .delivery_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unscheduled".to_string());
    let summary = route_to_json(route, options);
    format!(
        "{:>4}  {:<11}  {}  ({} stops, {} items, {})",
        route.id, date, route.name, summary.total_orders, summary.total_items, summary.driver
    )
}

/// Stop line: position, id, client and address
pub fn format_stop_line(order: &Order) -> String {
    let address = order.address.one_line();
    let eta = order
        .expected_arrival_time
        .as_deref()
        .map(|t| format!(" eta {}", t))
        .unwrap_or_default();
    if address.is_empty() {
        format!("{:>3}. #{} {}{}", order.delivery_arrangement, order.id, order.client_name, eta)
    } else {
        format!(
            "{:>3}. #{} {} - {}{}",
            order.delivery_arrangement, order.id, order.client_name, address, eta
        )
    }
}

pub fn format_route_detail(route: &Route, options: &OptionMaps) -> Vec<String> {
    let mut lines = vec![format_route_line(route, options)];
    if route.delivery_orders.is_empty() {
        lines.push("     (no stops)".to_string());
    }
    for order in &route.delivery_orders {
        lines.push(format!("  {}", format_stop_line(order)));
        for item in &order.delivery_items {
            lines.push(format!(
                "         - {} [{}]",
                item.name,
                options.item_state_name(item.item_state_id)
            ));
        }
    }
    if let Some(plans) = &route.saved_optimizations {
        let active = route.using_optimization_indx;
        lines.push(format!(
            "  plans: {}{}",
            plans.len(),
            active.map(|i| format!(" (using #{})", i)).unwrap_or_default()
        ));
    }
    lines
}

/// Month grid, Monday first, with the number of routes under each day
pub fn format_calendar(calendar: &CalendarMonth) -> Vec<String> {
    let mut lines = vec![
        calendar.month.format("%B %Y").to_string(),
        " Mo  Tu  We  Th  Fr  Sa  Su".to_string(),
    ];
    for week in calendar.weeks() {
        let cells: Vec<String> = week
            .iter()
            .map(|day| match day {
                Some(date) => {
                    let count = calendar.routes_on(*date).len();
                    let mark = if count == 0 {
                        " ".to_string()
                    } else {
                        count.to_string()
                    };
                    format!("{:>2}{}", date.format("%-d"), mark)
                }
                None => "   ".to_string(),
            })
            .collect();
        lines.push(cells.join(" "));
    }
    lines
}

pub fn format_plan_line(index: usize, plan: &RoutePlan, active: bool) -> String {
    let mut line = format!(
        "{} #{}  {} stops",
        if active { "*" } else { " " },
        index,
        plan.order_sequence.len()
    );
    if let Some(km) = plan.total_distance_km {
        line.push_str(&format!(", {:.1} km", km));
    }
    if let Some(min) = plan.total_duration_min {
        line.push_str(&format!(", {:.0} min", min));
    }
    line
}

pub fn format_sync_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Confirmed { kind, .. } => format!("{} saved", kind.label()),
        SyncOutcome::Failed {
            kind,
            error,
            rolled_back: true,
            ..
        } => format!("{} not saved ({}); change undone", kind.label(), error),
        SyncOutcome::Failed { kind, error, .. } => {
            format!("{} not saved ({}); local change kept", kind.label(), error)
        }
    }
}

pub fn format_check_error(err: &CheckError) -> String {
    match err {
        CheckError::CounterMismatch {
            route_id,
            counter,
            stored,
            counted,
        } => format!(
            "route {}: {} is {} but {} counted",
            route_id, counter, stored, counted
        ),
        CheckError::RouteIdMismatch {
            route_id,
            order_id,
            found,
        } => format!(
            "route {}: order {} says it belongs to route {}",
            route_id, order_id, found
        ),
        CheckError::DuplicateOrderId {
            order_id,
            route_ids,
        } => format!(
            "order {} appears on routes: {}",
            order_id,
            route_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        CheckError::DuplicateRouteId { route_id } => format!("route id {} is used twice", route_id),
    }
}

pub fn format_check_warning(warn: &CheckWarning) -> String {
    match warn {
        CheckWarning::NonDenseArrangement {
            route_id,
            arrangements,
        } => format!(
            "route {}: arrangement is {:?}, expected 0..{}",
            route_id,
            arrangements,
            arrangements.len()
        ),
        CheckWarning::MissingCounter { route_id, counter } => {
            format!("route {}: {} is not set", route_id, counter)
        }
        CheckWarning::UnknownDriver {
            route_id,
            driver_id,
        } => format!("route {}: unknown driver {}", route_id, driver_id),
        CheckWarning::UnknownItemState {
            order_id,
            item_state_id,
        } => format!("order {}: unknown item state {}", order_id, item_state_id),
        CheckWarning::PlanIndexOutOfRange {
            route_id,
            index,
            plans,
        } => format!(
            "route {}: uses plan #{} but has {} plans",
            route_id, index, plans
        ),
    }
}

pub fn print_check(result: &CheckResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for err in &result.errors {
            println!("  {}", format_check_error(err));
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            println!();
        }
        println!("Warnings:");
        for warn in &result.warnings {
            println!("  {}", format_check_warning(warn));
        }
    }
    if result.valid {
        println!("✓ dataset is valid");
    } else {
        println!("✗ dataset has errors");
    }
}
