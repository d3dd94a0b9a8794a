// Re-exported so binaries can `use libs::utils::setup_config` directly
pub use cli::setup_cli;
pub use config::setup_config;
pub use logger::setup_logger;

pub mod cli;
pub mod config;
pub mod logger;
