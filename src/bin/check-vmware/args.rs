use std::env;
use std::ffi::OsString;

use structopt::clap::{AppSettings, ErrorKind};
use structopt::StructOpt;

use vsphere_plugins::runner::Invocation;
use vsphere_plugins::Status;

static MEASUREMENT_HELP: &str = "About measurements:

    Checks starting with `host_` evaluate the esxi host named by --hostname,
    checks starting with `system_` evaluate everything vCenter knows about.
    Run with --list-checks to see them all.

    --warning and --critical are fractions (0.8 is 80%) for usage checks and
    task counts for `system_tasks`. When omitted, usage checks warn at 0.75 and
    go critical above 0.9, `system_tasks` warns above 7 and goes critical
    above 15 failed tasks.

Exit codes:

    0 OK, 1 WARNING, 2 CRITICAL, 3 UNKNOWN. Bad arguments, unknown hosts and
    unreachable endpoints are all UNKNOWN.

Environment:

    VSPHERE_PASSWORD    Used when --password is not given
    CHECK_VMWARE_LOG    Log filter for stderr diagnostics, e.g. `debug`
";

/// Check the health of vSphere hosts and vCenter inventories
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-vmware (part of vsphere-plugins)",
    setting = AppSettings::ColoredHelp,
    setting = AppSettings::AllowNegativeNumbers,
    after_help = MEASUREMENT_HELP
)]
pub(crate) struct Args {
    #[structopt(
        short = "V",
        long = "vsphere",
        help = "vCenter inventory endpoint: an http(s) URL or a path to an inventory JSON file"
    )]
    pub vsphere: Option<String>,
    #[structopt(short = "H", long = "hostname", help = "Name of the esxi host to check")]
    pub hostname: Option<String>,
    #[structopt(short = "u", long = "user", help = "User to authenticate as")]
    pub user: Option<String>,
    #[structopt(
        short = "p",
        long = "password",
        env = "VSPHERE_PASSWORD",
        hide_env_values = true,
        help = "Password for the vSphere endpoint"
    )]
    pub password: Option<String>,
    #[structopt(short = "m", long = "measurement", help = "The check to run")]
    pub measurement: Option<String>,
    #[structopt(
        short = "w",
        long = "warning",
        help = "Warning value for the check, e.g. 0.8"
    )]
    pub warning: Option<f64>,
    #[structopt(
        short = "c",
        long = "critical",
        help = "Critical value for the check, e.g. 0.9"
    )]
    pub critical: Option<f64>,
    #[structopt(
        long = "retries",
        default_value = "2",
        help = "How many times to retry reaching the endpoint"
    )]
    pub retries: u8,
    #[structopt(
        long = "timeout",
        name = "seconds",
        default_value = "10",
        help = "Seconds to wait for each request to the endpoint"
    )]
    pub timeout: u64,
    #[structopt(long = "list-checks", help = "List every known measurement and exit")]
    pub list_checks: bool,
    #[structopt(
        short = "v",
        long = "verbose",
        parse(from_occurrences),
        help = "Log diagnostics to stderr, repeat for more detail"
    )]
    pub verbose: u8,
}

impl Args {
    pub fn parse() -> Args {
        Args::parse_from(env::args_os())
    }

    /// Parse, exiting UNKNOWN on any argument error
    ///
    /// clap's own exit codes would be read as WARNING by the supervisor.
    pub fn parse_from<I>(argv: I) -> Args
    where
        I: IntoIterator,
        I::Item: Into<OsString> + Clone,
    {
        match Args::from_iter_safe(argv) {
            Ok(args) => args,
            Err(e) => match e.kind {
                ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => {
                    println!("{}", e.message);
                    Status::Ok.exit();
                }
                _ => {
                    println!("{}: {}", Status::Unknown, e.message);
                    Status::Unknown.exit();
                }
            },
        }
    }

    /// The endpoint and check parameters, if enough were given to run a check
    pub fn invocation(&self) -> Result<(String, Invocation), String> {
        let endpoint = self
            .vsphere
            .clone()
            .ok_or_else(|| "--vsphere is required to run a check".to_owned())?;
        let measurement = self
            .measurement
            .clone()
            .ok_or_else(|| "--measurement is required, see --list-checks".to_owned())?;
        Ok((
            endpoint,
            Invocation {
                measurement,
                host: self.hostname.clone(),
                warning: self.warning,
                critical: self.critical,
            },
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn build_args(argv: Vec<&str>) -> Args {
        Args::from_iter_safe(argv.into_iter()).unwrap()
    }

    #[test]
    fn defaults() {
        let args = build_args(vec!["check-vmware", "-V", "inv.json", "-m", "host_cpu"]);
        assert_eq!(args.retries, 2);
        assert_eq!(args.timeout, 10);
        assert_eq!(args.warning, None);
        assert_eq!(args.verbose, 0);
        assert!(!args.list_checks);
    }

    #[test]
    fn full_invocation() {
        let args = build_args(vec![
            "check-vmware",
            "-V",
            "https://vcenter/inventory",
            "-H",
            "esx1",
            "-u",
            "monitor",
            "-p",
            "hunter2",
            "-m",
            "host_memory",
            "-w",
            "0.8",
            "-c",
            "0.95",
            "-vv",
        ]);
        assert_eq!(args.verbose, 2);
        let (endpoint, inv) = args.invocation().unwrap();
        assert_eq!(endpoint, "https://vcenter/inventory");
        assert_eq!(
            inv,
            Invocation {
                measurement: "host_memory".into(),
                host: Some("esx1".into()),
                warning: Some(0.8),
                critical: Some(0.95),
            }
        );
    }

    #[test]
    fn missing_pieces_are_reported() {
        let args = build_args(vec!["check-vmware", "-m", "host_cpu"]);
        assert!(args.invocation().unwrap_err().contains("--vsphere"));
        let args = build_args(vec!["check-vmware", "-V", "inv.json"]);
        assert!(args.invocation().unwrap_err().contains("--measurement"));
    }

    #[test]
    fn thresholds_must_be_numbers() {
        let err = Args::from_iter_safe(vec!["check-vmware", "-w", "lots"].into_iter()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValueValidation);
    }

    #[test]
    fn negative_thresholds_parse() {
        let args = build_args(vec![
            "check-vmware", "-V", "inv.json", "-m", "host_cpu", "-w", "-0.5", "-c", "-0.25",
        ]);
        assert_eq!(args.warning, Some(-0.5));
        assert_eq!(args.critical, Some(-0.25));
        assert_eq!(args.measurement.as_deref(), Some("host_cpu"));
    }

    #[test]
    fn list_checks_needs_nothing_else() {
        assert!(build_args(vec!["check-vmware", "--list-checks"]).list_checks);
    }
}
