pub mod live_monitor;

pub use live_monitor::{run_poll_loop, spawn_live_monitor_task};
