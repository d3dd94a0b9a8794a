pub mod export;
pub mod feed;
pub mod models;
pub mod registry;
pub mod simulator;
pub mod telemetry;
pub mod utils;
