//! Check the health of vSphere hosts and vCenter inventories

mod args;

use std::io;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use vsphere_plugins::checks::CheckRegistry;
use vsphere_plugins::inventory::InventoryClient;
use vsphere_plugins::ping::PingProbe;
use vsphere_plugins::runner::{CheckRunner, StdoutReporter};
use vsphere_plugins::Status;

use args::Args;

/// Diagnostics go to stderr, stdout is reserved for the status line
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "off",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("CHECK_VMWARE_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn print_checks(registry: &CheckRegistry) {
    for check in registry.iter() {
        println!(
            "{:<32} {:<7} {}",
            check.name(),
            check.target_kind(),
            check.about()
        );
    }
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let registry = CheckRegistry::standard();
    if args.list_checks {
        print_checks(&registry);
        Status::Ok.exit();
    }

    let (endpoint, invocation) = match args.invocation() {
        Ok(parts) => parts,
        Err(msg) => {
            println!("{}: {}", Status::Unknown, msg);
            Status::Unknown.exit();
        }
    };

    let connector = InventoryClient::new(endpoint)
        .credentials(args.user, args.password)
        .timeout(Duration::from_secs(args.timeout))
        .retries(args.retries);
    let runner = CheckRunner::new(
        registry,
        connector,
        Box::new(PingProbe::default()),
        StdoutReporter,
    );
    runner.run(&invocation).exit();
}
