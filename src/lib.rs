//! vSphere plugins: strongly typed Sensu/Nagios checks for vSphere
//!
//! Every check reduces some part of a vCenter inventory to one [`Status`]
//! plus a human readable explanation, and the `check-vmware` binary exits
//! with the status code the monitoring supervisor expects:
//!
//! | status   | exit code |
//! |----------|-----------|
//! | OK       | 0         |
//! | WARNING  | 1         |
//! | CRITICAL | 2         |
//! | UNKNOWN  | 3         |
//!
//! Expected use is the `check-vmware` binary, but the pieces are usable on
//! their own:
//!
//! ```rust
//! use vsphere_plugins::checks::CheckRegistry;
//! use vsphere_plugins::{Status, ThresholdPolicy};
//!
//! let registry = CheckRegistry::standard();
//! let check = registry.get("host_cpu").unwrap();
//! assert_eq!(check.defaults(), ThresholdPolicy::fractions());
//! assert_eq!(Status::Critical.exit_code(), 2);
//! ```
//!
//! See the [`scripts`] module for the command line documentation.

use std::fmt;
use std::process;
use std::str::FromStr;

pub mod aggregate;
pub mod checks;
pub mod classify;
pub mod inventory;
pub mod ping;
pub mod plane;
pub mod runner;
pub mod scripts;
pub mod threshold;

pub use crate::threshold::{InvalidThreshold, ThresholdPolicy};

/// The four-valued health verdict
///
/// `Unknown` means the health could not be determined, it is never a
/// stand-in for a confirmed failure.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Ok,
        Status::Warning,
        Status::Critical,
        Status::Unknown,
    ];

    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    #[cfg_attr(test, allow(dead_code))]
    pub fn exit(self) -> ! {
        process::exit(self.exit_code())
    }

    /// Rank used when reducing many statuses to one
    ///
    /// `Critical > Warning > Unknown > Ok`: a known problem wins over an
    /// indeterminate entity, which in turn is never hidden by healthy ones.
    pub fn precedence(self) -> u8 {
        match self {
            Status::Critical => 3,
            Status::Warning => 2,
            Status::Unknown => 1,
            Status::Ok => 0,
        }
    }

    /// Whichever of the two statuses has the higher precedence
    pub fn worst(self, other: Status) -> Status {
        if other.precedence() > self.precedence() {
            other
        } else {
            self
        }
    }

    pub fn str_values() -> [&'static str; 4] {
        ["ok", "warning", "critical", "unknown"]
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match *self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        };
        write!(f, "{}", msg)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Status, String> {
        match s.to_ascii_lowercase().as_ref() {
            "ok" => Ok(Status::Ok),
            "warning" | "warn" => Ok(Status::Warning),
            "critical" | "crit" => Ok(Status::Critical),
            "unknown" => Ok(Status::Unknown),
            _ => Err(format!(
                "Unexpected status: {}, expected one of {}",
                s,
                Status::str_values().join(", ")
            )),
        }
    }
}
