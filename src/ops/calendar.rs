use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

use crate::model::{Route, RouteId};

/// Routes of one month, grouped by delivery date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarMonth {
    /// First day of the month
    pub month: NaiveDate,
    /// Every day of the month, in order, with the routes scheduled on it
    pub days: BTreeMap<NaiveDate, Vec<RouteId>>,
}

impl CalendarMonth {
    pub fn routes_on(&self, date: NaiveDate) -> &[RouteId] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Monday-first weeks covering the month; days outside it are `None`
    pub fn weeks(&self) -> Vec<[Option<NaiveDate>; 7]> {
        let mut weeks = Vec::new();
        let mut week = [None; 7];
        for date in self.days.keys() {
            let col = date.weekday().num_days_from_monday() as usize;
            week[col] = Some(*date);
            if date.weekday() == Weekday::Sun {
                weeks.push(week);
                week = [None; 7];
            }
        }
        if week.iter().any(Option::is_some) {
            weeks.push(week);
        }
        weeks
    }
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn next_month(date: NaiveDate) -> NaiveDate {
    let start = month_start(date);
    let (y, m) = if start.month() == 12 {
        (start.year() + 1, 1)
    } else {
        (start.year(), start.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(start)
}

pub fn prev_month(date: NaiveDate) -> NaiveDate {
    month_start(month_start(date) - Duration::days(1))
}

/// Group `routes` by delivery date over the month containing `month`.
/// Undated routes and routes in other months are left out.
pub fn build_calendar(routes: &[Route], month: NaiveDate) -> CalendarMonth {
    let start = month_start(month);
    let end = next_month(start);
    let mut days = BTreeMap::new();
    let mut day = start;
    while day < end {
        days.insert(day, Vec::new());
        day += Duration::days(1);
    }
    for route in routes {
        if let Some(date) = route.delivery_date
            && let Some(slot) = days.get_mut(&date)
        {
            slot.push(route.id);
        }
    }
    CalendarMonth { month: start, days }
}

/// What dropping an order on a calendar day should do
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DateDropResolution {
    /// Exactly one other route that day: move there
    Transfer { target_route_id: RouteId },
    /// Several candidate routes: ask which one
    ChooseRoute { candidates: Vec<RouteId> },
    /// No route that day: create one, then move there
    CreateRoute { date: NaiveDate },
    /// Only the order's own route is scheduled that day
    Ignore,
}

pub fn resolve_date_drop(
    routes: &[Route],
    date: NaiveDate,
    source_route_id: RouteId,
) -> DateDropResolution {
    let on_date: Vec<RouteId> = routes
        .iter()
        .filter(|r| r.delivery_date == Some(date))
        .map(|r| r.id)
        .collect();
    if on_date.is_empty() {
        return DateDropResolution::CreateRoute { date };
    }
    let candidates: Vec<RouteId> = on_date
        .into_iter()
        .filter(|id| *id != source_route_id)
        .collect();
    match candidates.as_slice() {
        [] => DateDropResolution::Ignore,
        [only] => DateDropResolution::Transfer {
            target_route_id: *only,
        },
        _ => DateDropResolution::ChooseRoute { candidates },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dated(id: RouteId, date: Option<NaiveDate>) -> Route {
        let mut r = Route::new(id, format!("R{}", id));
        r.delivery_date = date;
        r
    }

    #[test]
    fn month_navigation() {
        assert_eq!(month_start(d(2024, 2, 17)), d(2024, 2, 1));
        assert_eq!(next_month(d(2024, 12, 5)), d(2025, 1, 1));
        assert_eq!(prev_month(d(2024, 1, 31)), d(2023, 12, 1));
    }

    #[test]
    fn calendar_groups_by_date() {
        let routes = vec![
            dated(1, Some(d(2024, 3, 4))),
            dated(2, Some(d(2024, 3, 4))),
            dated(3, Some(d(2024, 4, 1))),
            dated(4, None),
        ];
        let cal = build_calendar(&routes, d(2024, 3, 20));
        assert_eq!(cal.month, d(2024, 3, 1));
        assert_eq!(cal.days.len(), 31);
        assert_eq!(cal.routes_on(d(2024, 3, 4)), &[1, 2]);
        assert!(cal.routes_on(d(2024, 3, 5)).is_empty());
        assert!(cal.routes_on(d(2024, 4, 1)).is_empty());
    }

    #[test]
    fn weeks_start_on_monday() {
        // 1 March 2024 was a Friday
        let cal = build_calendar(&[], d(2024, 3, 1));
        let weeks = cal.weeks();
        assert_eq!(weeks[0][4], Some(d(2024, 3, 1)));
        assert_eq!(weeks[0][0], None);
        assert_eq!(weeks.len(), 5);
        assert_eq!(weeks[4][6], Some(d(2024, 3, 31)));
    }

    #[test]
    fn drop_resolution_cases() {
        let day = d(2024, 5, 10);
        let routes = vec![
            dated(1, Some(day)),
            dated(2, Some(day)),
            dated(3, Some(day)),
            dated(4, Some(d(2024, 5, 11))),
        ];
        assert_eq!(
            resolve_date_drop(&routes, day, 1),
            DateDropResolution::ChooseRoute {
                candidates: vec![2, 3]
            }
        );
        assert_eq!(
            resolve_date_drop(&routes[..2], day, 1),
            DateDropResolution::Transfer { target_route_id: 2 }
        );
        assert_eq!(
            resolve_date_drop(&routes, d(2024, 5, 11), 4),
            DateDropResolution::Ignore
        );
        assert_eq!(
            resolve_date_drop(&routes, d(2024, 5, 12), 1),
            DateDropResolution::CreateRoute {
                date: d(2024, 5, 12)
            }
        );
    }
}
