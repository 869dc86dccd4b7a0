//! Reachability probing for virtual machines

use std::fmt;
use std::io;
use std::net::IpAddr;
use std::process::{Command, Stdio};

use tracing::debug;

/// Whether a machine answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Up,
    Down,
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Reachability::Up => write!(f, "Up"),
            Reachability::Down => write!(f, "Down"),
        }
    }
}

/// Something that can tell whether an address is reachable
///
/// Implementations must return in bounded time.
pub trait Prober {
    /// `Err` means the probe itself could not be run
    fn probe(&self, address: &str) -> io::Result<Reachability>;
}

/// Shells out to the system `ping`, one echo request with a fixed timeout
///
/// Only literal IP addresses are probed, anything else is refused before a
/// process is spawned.
#[derive(Debug, Clone)]
pub struct PingProbe {
    count: u8,
    timeout_secs: u8,
}

impl PingProbe {
    pub fn new(count: u8, timeout_secs: u8) -> PingProbe {
        PingProbe {
            count: count.max(1),
            timeout_secs: timeout_secs.max(1),
        }
    }

    fn command(&self, address: &str) -> Command {
        let mut cmd = Command::new("ping");
        cmd.arg("-c")
            .arg(self.count.to_string())
            .arg("-W")
            .arg(self.timeout_secs.to_string())
            .arg(address)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

impl Default for PingProbe {
    fn default() -> PingProbe {
        PingProbe::new(1, 4)
    }
}

impl Prober for PingProbe {
    fn probe(&self, address: &str) -> io::Result<Reachability> {
        let address = address
            .parse::<IpAddr>()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{}: {}", address, e)))?;
        let status = self.command(&address.to_string()).status()?;
        debug!(%address, ?status, "ping finished");
        if status.success() {
            Ok(Reachability::Up)
        } else {
            Ok(Reachability::Down)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn command_is_bounded() {
        let cmd = PingProbe::default().command("10.0.0.1");
        let args = cmd
            .get_args()
            .map(|a| a.to_str().unwrap().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(cmd.get_program(), "ping");
        assert_eq!(args, vec!["-c", "1", "-W", "4", "10.0.0.1"]);
    }

    #[test]
    fn zero_values_are_raised_to_one() {
        let cmd = PingProbe::new(0, 0).command("host");
        let args = cmd
            .get_args()
            .map(|a| a.to_str().unwrap().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(args, vec!["-c", "1", "-W", "1", "host"]);
    }

    #[test]
    fn non_addresses_are_refused() {
        let probe = PingProbe::default();
        for bogus in &["-f", "--help", "vm.example.com", ""] {
            let err = probe.probe(bogus).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{}", bogus);
        }
    }
}
