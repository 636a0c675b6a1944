pub mod arrangement;
pub mod calendar;
pub mod check;
pub mod drafts;
pub mod plan;
pub mod reorder;
pub mod search;
pub mod transfer;
