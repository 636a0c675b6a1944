pub mod config_io;
pub mod dataset_io;
pub mod lock;
pub mod logging;
pub mod project_io;
pub mod state;
pub mod watcher;
