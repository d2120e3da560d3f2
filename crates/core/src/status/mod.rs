mod decode;
mod snapshot;

pub use decode::{decode, BATTERY_CHARGE, BATTERY_RUNTIME, UPS_STATUS};
pub use snapshot::{SnapshotSource, StatusSnapshot, ON_BATTERY, ON_LINE};
