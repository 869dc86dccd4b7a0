//! Turn a single raw observation into a `Status`
//!
//! Everything in here is pure: the same inputs always produce the same
//! status.

use crate::threshold::ThresholdPolicy;
use crate::Status;

/// Round a ratio to three decimal places, the precision thresholds are
/// compared at
pub fn round_ratio(ratio: f64) -> f64 {
    (ratio * 1000.0).round() / 1000.0
}

/// `used / total`, rounded to three places
///
/// Returns `None` if there is no meaningful whole to divide by.
pub fn usage_fraction(used: f64, total: f64) -> Option<f64> {
    if !(total > 0.0) || !used.is_finite() {
        return None;
    }
    Some(round_ratio(used / total))
}

/// The used part of a capacity given how much of it is still free
pub fn used_fraction_from_free(free: f64, capacity: f64) -> Option<f64> {
    usage_fraction(capacity - free, capacity)
}

/// Compare a ratio against a policy
///
/// `observed == crit` falls through every branch and is reported as
/// `Unknown`. Existing deployments rely on that boundary, so it is kept.
pub fn fractional(observed: f64, policy: &ThresholdPolicy) -> Status {
    if observed < policy.warn() {
        Status::Ok
    } else if observed < policy.crit() {
        Status::Warning
    } else if observed > policy.crit() {
        Status::Critical
    } else {
        Status::Unknown
    }
}

/// Compare a count against a policy, ties fall through to the lower status
pub fn count(observed: u64, policy: &ThresholdPolicy) -> Status {
    let observed = observed as f64;
    if observed > policy.crit() {
        Status::Critical
    } else if observed > policy.warn() {
        Status::Warning
    } else {
        Status::Ok
    }
}

/// Map the vSphere `ManagedEntityStatus` vocabulary
///
/// `gray` and anything missing or unexpected is `Unknown`.
pub fn categorical(status: Option<&str>) -> Status {
    match status {
        Some("green") => Status::Ok,
        Some("yellow") => Status::Warning,
        Some("red") => Status::Critical,
        _ => Status::Unknown,
    }
}

/// Two state checks have no warning tier
pub fn binary(healthy: bool) -> Status {
    if healthy {
        Status::Ok
    } else {
        Status::Critical
    }
}

/// `connected` is the only healthy `VirtualMachineConnectionState`
///
/// Disconnected, inaccessible, invalid and orphaned machines are all
/// critical.
pub fn connection(state: Option<&str>) -> Status {
    binary(state == Some("connected"))
}
