//! UPS monitoring daemon: polls upsd, notifies on abnormal power, and halts
//! the host when the battery runs low.

pub mod config;
pub mod error;
pub mod halt;
pub mod logging;
pub mod notify;
pub mod policy;
pub mod runtime;
pub mod status;
