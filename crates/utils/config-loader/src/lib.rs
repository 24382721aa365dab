pub mod app_config;
pub mod limiter;
pub mod loader;
pub mod logging;

pub use loader::{load_config, load_config_with_env};
