pub mod board;
pub mod cache;
pub mod cli;
pub mod io;
pub mod model;
pub mod ops;
pub mod store;
pub mod sync;
pub mod tui;
pub mod util;
pub mod view;
