pub mod config;
pub mod dataset;
pub mod item;
pub mod options;
pub mod order;
pub mod project;
pub mod route;

pub use config::*;
pub use dataset::*;
pub use item::*;
pub use options::*;
pub use order::*;
pub use project::*;
pub use route::*;
