use std::collections::{BTreeSet, HashMap};

use super::snapshot::{SnapshotSource, StatusSnapshot};

pub const BATTERY_CHARGE: &str = "battery.charge";
pub const BATTERY_RUNTIME: &str = "battery.runtime";
pub const UPS_STATUS: &str = "ups.status";

/// Decode a `LIST VAR` mapping into a snapshot.
///
/// Never fails: a missing or malformed field falls back to its default
/// (0 for numbers, no flags for status) and the cycle carries on.
pub fn decode(vars: &HashMap<String, String>) -> StatusSnapshot {
    let charge = parse_number(vars.get(BATTERY_CHARGE));
    let battery_charge_percent = match u8::try_from(charge) {
        Ok(pct) if pct <= 100 => pct,
        _ => {
            let clamped = charge.clamp(0, 100) as u8;
            tracing::warn!(
                reported = charge,
                clamped,
                "battery.charge outside 0-100, clamping"
            );
            clamped
        }
    };

    let runtime = parse_number(vars.get(BATTERY_RUNTIME));
    let runtime_remaining_secs = u64::try_from(runtime).unwrap_or_else(|_| {
        tracing::warn!(reported = runtime, "negative battery.runtime, using 0");
        0
    });

    let raw_status = vars.get(UPS_STATUS).cloned();
    let status_flags: BTreeSet<String> = raw_status
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_owned)
        .collect();

    StatusSnapshot {
        battery_charge_percent,
        runtime_remaining_secs,
        status_flags,
        raw_status,
        source: SnapshotSource::Reported,
    }
}

/// Integer value of a variable. Decimal renderings such as `"87.0"` are
/// truncated; absent or unparsable values are 0.
fn parse_number(raw: Option<&String>) -> i64 {
    let Some(raw) = raw.map(|s| s.trim()) else {
        return 0;
    };
    if let Ok(n) = raw.parse::<i64>() {
        return n;
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => f.trunc() as i64,
        _ => 0,
    }
}
