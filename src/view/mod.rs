pub mod drag;
pub mod stack;

pub use drag::{DataTransfer, DragPayload, OrderTransfer, RouteTransfer, ORDER_TRANSFER, ROUTE_TRANSFER};
pub use stack::{OpenRequest, PanelEntry, PanelId, ViewStack};
