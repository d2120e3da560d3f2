mod loop_control;
mod monitor;
mod shutdown;

pub use loop_control::{CycleOutcome, wait_next_cycle};
pub use monitor::{Monitor, MonitorExit, MonitorState};
pub use shutdown::ShutdownGuard;
