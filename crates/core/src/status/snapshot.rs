use std::collections::BTreeSet;

/// Status flag: running on line (utility) power.
pub const ON_LINE: &str = "OL";
/// Status flag: running on battery.
pub const ON_BATTERY: &str = "OB";

/// Where a snapshot's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    /// Decoded from a variable listing returned by the UPS service.
    Reported,
    /// The variable fetch failed; every field holds its default.
    Unavailable,
}

/// One poll cycle's view of the UPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub battery_charge_percent: u8,
    pub runtime_remaining_secs: u64,
    /// Unordered status codes. Unrecognised codes are kept but ignored by policy.
    pub status_flags: BTreeSet<String>,
    /// `ups.status` as reported, `None` when absent.
    pub raw_status: Option<String>,
    pub source: SnapshotSource,
}

impl StatusSnapshot {
    /// Snapshot for a cycle whose variable fetch failed.
    pub fn unavailable() -> Self {
        Self {
            battery_charge_percent: 0,
            runtime_remaining_secs: 0,
            status_flags: BTreeSet::new(),
            raw_status: None,
            source: SnapshotSource::Unavailable,
        }
    }

    pub fn is_on_line(&self) -> bool {
        self.status_flags.contains(ON_LINE)
    }

    pub fn is_on_battery(&self) -> bool {
        self.status_flags.contains(ON_BATTERY)
    }

    pub fn is_reported(&self) -> bool {
        self.source == SnapshotSource::Reported
    }

    /// Status text for logs and messages; "Unknown" when the UPS sent none.
    pub fn status_text(&self) -> &str {
        match self.raw_status.as_deref() {
            Some(s) if !s.trim().is_empty() => s.trim(),
            _ => "Unknown",
        }
    }
}
