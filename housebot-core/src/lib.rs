// src/lib.rs

pub mod config;
pub mod platforms;
pub mod monitor;
pub mod tasks;
pub mod utils;
pub mod test_utils;

pub use config::MonitorConfig;
pub use housebot_common::error::Error;
pub use monitor::LiveMonitor;
