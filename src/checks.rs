//! Every check `check-vmware` knows how to run, and the registry of them
//!
//! Checks whose name starts with `host_` evaluate a single ESXi host that the
//! runner has already looked up. Checks starting with `system_` evaluate the
//! whole vCenter inventory.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use itertools::Itertools;
use tracing::{debug, warn};

use crate::aggregate::{aggregate, AggregateResult, Observation, Phrasing, Reading};
use crate::classify;
use crate::ping::{Prober, Reachability};
use crate::plane::{Datastore, Host, ManagementPlane, PlaneError, Task};
use crate::threshold::ThresholdPolicy;
use crate::Status;

/// How far back `system_tasks` looks
pub const TASK_WINDOW: Duration = Duration::from_secs(10 * 60);

/// What a check needs to be handed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Host,
    System,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TargetKind::Host => write!(f, "host"),
            TargetKind::System => write!(f, "system"),
        }
    }
}

/// Everything a system-wide check may query
pub struct Environment<'a> {
    pub plane: &'a dyn ManagementPlane,
    pub prober: &'a dyn Prober,
}

pub type HostCheck = fn(&Host, &ThresholdPolicy) -> AggregateResult;
pub type SystemCheck = fn(&Environment, &ThresholdPolicy) -> Result<AggregateResult, PlaneError>;

/// The body of a check, tagged with the target it runs against
#[derive(Clone, Copy)]
pub enum Evaluation {
    Host(HostCheck),
    System(SystemCheck),
}

impl fmt::Debug for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Evaluation::Host(_) => write!(f, "Evaluation::Host(..)"),
            Evaluation::System(_) => write!(f, "Evaluation::System(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckDescriptor {
    name: &'static str,
    about: &'static str,
    defaults: ThresholdPolicy,
    evaluation: Evaluation,
}

impl CheckDescriptor {
    pub fn new(
        name: &'static str,
        about: &'static str,
        defaults: ThresholdPolicy,
        evaluation: Evaluation,
    ) -> CheckDescriptor {
        CheckDescriptor {
            name,
            about,
            defaults,
            evaluation,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn about(&self) -> &'static str {
        self.about
    }

    /// The thresholds used for any bound not given on the command line
    pub fn defaults(&self) -> ThresholdPolicy {
        self.defaults
    }

    pub fn evaluation(&self) -> Evaluation {
        self.evaluation
    }

    pub fn target_kind(&self) -> TargetKind {
        match self.evaluation {
            Evaluation::Host(_) => TargetKind::Host,
            Evaluation::System(_) => TargetKind::System,
        }
    }
}

/// The fixed table of checks, built once at startup
#[derive(Debug, Clone)]
pub struct CheckRegistry {
    checks: Vec<CheckDescriptor>,
}

impl CheckRegistry {
    pub fn standard() -> CheckRegistry {
        let fractions = ThresholdPolicy::fractions();
        let check = CheckDescriptor::new;
        CheckRegistry {
            checks: vec![
                check(
                    "host_status",
                    "Overall status (green/yellow/red) of the host",
                    fractions,
                    Evaluation::Host(host_overall_status),
                ),
                check(
                    "host_cpu",
                    "CPU usage of the host as a fraction of its total clock speed",
                    fractions,
                    Evaluation::Host(host_cpu_usage),
                ),
                check(
                    "host_memory",
                    "Memory usage of the host as a fraction of its total memory",
                    fractions,
                    Evaluation::Host(host_memory_usage),
                ),
                check(
                    "host_datastore_accessibility",
                    "Every datastore mounted on the host is accessible",
                    fractions,
                    Evaluation::Host(host_datastore_accessibility),
                ),
                check(
                    "host_datastore_status",
                    "Overall status of every datastore mounted on the host",
                    fractions,
                    Evaluation::Host(host_datastore_status),
                ),
                check(
                    "host_datastore_usage",
                    "Used capacity of every datastore mounted on the host",
                    fractions,
                    Evaluation::Host(host_datastore_usage),
                ),
                check(
                    "system_datastore_accessibility",
                    "Every datastore in vCenter is accessible",
                    fractions,
                    Evaluation::System(system_datastore_accessibility),
                ),
                check(
                    "system_datastore_status",
                    "Overall status of every datastore in vCenter",
                    fractions,
                    Evaluation::System(system_datastore_status),
                ),
                check(
                    "system_datastore_usage",
                    "Used capacity of every datastore in vCenter",
                    fractions,
                    Evaluation::System(system_datastore_usage),
                ),
                check(
                    "system_connection_vms",
                    "Every VM is connected",
                    fractions,
                    Evaluation::System(system_connection_vms),
                ),
                check(
                    "system_ping_vms",
                    "Every powered on VM with an IP address answers a ping",
                    fractions,
                    Evaluation::System(system_ping_vms),
                ),
                check(
                    "system_network_accessibility",
                    "Every network defined in vCenter is accessible",
                    fractions,
                    Evaluation::System(system_network_accessibility),
                ),
                check(
                    "system_tasks",
                    "Number of tasks that failed in the last 10 minutes",
                    ThresholdPolicy::counts(),
                    Evaluation::System(system_recent_tasks),
                ),
            ],
        }
    }

    /// Look up a check by name, `None` if there is no such check
    pub fn get(&self, name: &str) -> Option<&CheckDescriptor> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CheckDescriptor> {
        self.checks.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name).collect()
    }
}

// Host checks

fn host_overall_status(host: &Host, _: &ThresholdPolicy) -> AggregateResult {
    let state = host.overall_status.clone().unwrap_or_default();
    let status = classify::categorical(host.overall_status.as_deref());
    let message = match status {
        Status::Ok => format!("{}: overall status of host {} is {}", status, host.name, state),
        Status::Warning => format!("{}: esxi host {} may have a problem ({})", status, host.name, state),
        Status::Critical => format!(
            "{}: esxi host {} definitely has a problem ({})",
            status, host.name, state
        ),
        Status::Unknown => format!(
            "{}: status of esxi host {} is unknown ({})",
            status,
            host.name,
            Reading::State(state.clone())
        ),
    };
    AggregateResult::single(
        Observation::new(host.name.clone(), Reading::State(state), status),
        message,
    )
}

fn host_cpu_usage(host: &Host, policy: &ThresholdPolicy) -> AggregateResult {
    let used = host.quick_stats.overall_cpu_usage as f64;
    usage_of_host(host, "cpu", used, host.cpu_capacity_mhz(), policy)
}

fn host_memory_usage(host: &Host, policy: &ThresholdPolicy) -> AggregateResult {
    let used = host.quick_stats.overall_memory_usage as f64;
    usage_of_host(host, "memory", used, host.memory_capacity_mb(), policy)
}

fn usage_of_host(
    host: &Host,
    resource: &str,
    used: f64,
    total: f64,
    policy: &ThresholdPolicy,
) -> AggregateResult {
    let fraction = match classify::usage_fraction(used, total) {
        Some(fraction) => fraction,
        None => {
            let message = format!(
                "{}: {} usage is unknown on host {}, it reports no {} capacity",
                Status::Unknown,
                resource,
                host.name,
                resource
            );
            return AggregateResult::single(
                Observation::new(host.name.clone(), Reading::Unavailable, Status::Unknown),
                message,
            );
        }
    };
    let status = classify::fractional(fraction, policy);
    let reading = Reading::Ratio(fraction);
    let message = match status {
        Status::Ok => format!(
            "{}: {} usage of host {} is {} (warning at {})",
            status,
            resource,
            host.name,
            reading,
            Reading::Ratio(policy.warn())
        ),
        Status::Warning => format!(
            "{}: {} usage of host {} is {} (critical above {})",
            status,
            resource,
            host.name,
            reading,
            Reading::Ratio(policy.crit())
        ),
        Status::Critical => format!(
            "{}: {} usage of host {} is {} (more than {})",
            status,
            resource,
            host.name,
            reading,
            Reading::Ratio(policy.crit())
        ),
        Status::Unknown => format!(
            "{}: {} usage of host {} is {}, exactly the critical threshold",
            status, resource, host.name, reading
        ),
    };
    AggregateResult::single(Observation::new(host.name.clone(), reading, status), message)
}

fn host_datastore_accessibility(host: &Host, _: &ThresholdPolicy) -> AggregateResult {
    datastore_accessibility(&host.datastores)
}

fn host_datastore_status(host: &Host, _: &ThresholdPolicy) -> AggregateResult {
    datastore_status(&host.datastores)
}

fn host_datastore_usage(host: &Host, policy: &ThresholdPolicy) -> AggregateResult {
    datastore_usage(&host.datastores, policy)
}

// System checks

fn system_datastore_accessibility(
    env: &Environment,
    _: &ThresholdPolicy,
) -> Result<AggregateResult, PlaneError> {
    Ok(datastore_accessibility(&env.plane.datastores()?))
}

fn system_datastore_status(
    env: &Environment,
    _: &ThresholdPolicy,
) -> Result<AggregateResult, PlaneError> {
    Ok(datastore_status(&env.plane.datastores()?))
}

fn system_datastore_usage(
    env: &Environment,
    policy: &ThresholdPolicy,
) -> Result<AggregateResult, PlaneError> {
    Ok(datastore_usage(&env.plane.datastores()?, policy))
}

fn system_connection_vms(
    env: &Environment,
    _: &ThresholdPolicy,
) -> Result<AggregateResult, PlaneError> {
    let observations = env
        .plane
        .virtual_machines()?
        .into_iter()
        .map(|vm| {
            let status = classify::connection(vm.connection_state.as_deref());
            let reading = Reading::State(vm.connection_state.unwrap_or_default());
            Observation::new(vm.name, reading, status)
        })
        .collect();
    Ok(aggregate(
        observations,
        &Phrasing {
            entities: "virtual machines",
            critical: "the following VMs are not connected",
            warning: "the following VMs may not be connected",
            unknown: "the following VMs are in an unknown connection state",
            ok: "all VMs are connected",
            table: "Connection state of all VMs",
        },
    ))
}

fn system_ping_vms(env: &Environment, _: &ThresholdPolicy) -> Result<AggregateResult, PlaneError> {
    let observations = env
        .plane
        .virtual_machines()?
        .into_iter()
        .filter(|vm| vm.is_running())
        .filter_map(|vm| {
            let ip = vm.ip_address.filter(|ip| !ip.is_empty())?;
            let addr = match ip.parse::<IpAddr>() {
                Ok(addr) => addr,
                Err(e) => {
                    let reading = format!("{} invalid address: {}", ip, e);
                    return Some(Observation::new(vm.name, Reading::State(reading), Status::Unknown));
                }
            };
            let (reading, status) = match env.prober.probe(&addr.to_string()) {
                Ok(reach) => {
                    let healthy = reach == Reachability::Up;
                    (format!("{} {}", ip, reach), classify::binary(healthy))
                }
                Err(e) => {
                    warn!(vm = %vm.name, ip = %ip, error = %e, "could not probe vm");
                    (format!("{} probe failed: {}", ip, e), Status::Unknown)
                }
            };
            Some(Observation::new(vm.name, Reading::State(reading), status))
        })
        .collect();
    Ok(aggregate(
        observations,
        &Phrasing {
            entities: "running VMs with an IP address",
            critical: "the following VMs are inaccessible",
            warning: "the following VMs may be inaccessible",
            unknown: "the following VMs could not be probed",
            ok: "all running VMs that have IPs are accessible",
            table: "Ping status of all running VMs",
        },
    ))
}

fn system_network_accessibility(
    env: &Environment,
    _: &ThresholdPolicy,
) -> Result<AggregateResult, PlaneError> {
    let observations = env
        .plane
        .networks()?
        .into_iter()
        .map(|net| {
            let reading = Reading::State(accessibility(net.accessible).into());
            Observation::new(net.name, reading, classify::binary(net.accessible))
        })
        .collect();
    Ok(aggregate(
        observations,
        &Phrasing {
            entities: "networks",
            critical: "the following networks are inaccessible",
            warning: "the following networks may be inaccessible",
            unknown: "the following networks are in an unknown state",
            ok: "all networks defined on this vCenter are accessible",
            table: "Accessibility of all networks",
        },
    ))
}

fn system_recent_tasks(
    env: &Environment,
    policy: &ThresholdPolicy,
) -> Result<AggregateResult, PlaneError> {
    let failed = env
        .plane
        .recent_tasks(TASK_WINDOW)?
        .into_iter()
        .filter(Task::failed)
        .collect::<Vec<_>>();
    let count = failed.len() as u64;
    debug!(count, %policy, "failed tasks in window");
    let status = classify::count(count, policy);
    let minutes = TASK_WINDOW.as_secs() / 60;

    let mut message = match status {
        Status::Critical => format!(
            "{}: {} tasks failed in the last {} minutes, more than {}",
            status,
            count,
            minutes,
            policy.crit()
        ),
        Status::Warning => format!(
            "{}: {} tasks failed in the last {} minutes, more than {}",
            status,
            count,
            minutes,
            policy.warn()
        ),
        _ => format!(
            "{}: {} tasks failed in the last {} minutes, at most {} allowed",
            status,
            count,
            minutes,
            policy.warn()
        ),
    };
    let observations = failed
        .into_iter()
        .map(|task| {
            let completed = task
                .complete_time
                .map_or_else(|| "not completed".to_owned(), |t| t.to_rfc3339());
            let reading = format!(
                "{}: {} at {}",
                task.state,
                task.error.unwrap_or_default(),
                completed
            );
            let identifier = format!("{} on {}", task.description_id, task.entity_name);
            Observation::new(identifier, Reading::State(reading), status)
        })
        .collect::<Vec<_>>();
    if !observations.is_empty() {
        message.push_str(&format!("\nFailed tasks: {}", observations.iter().join(", ")));
    }
    Ok(AggregateResult::new(status, observations, message))
}

// Shared collection checks

fn accessibility(accessible: bool) -> &'static str {
    if accessible {
        "accessible"
    } else {
        "inaccessible"
    }
}

fn datastore_accessibility(datastores: &[Datastore]) -> AggregateResult {
    let observations = datastores
        .iter()
        .map(|ds| {
            Observation::new(
                ds.name.clone(),
                Reading::State(accessibility(ds.accessible).into()),
                classify::binary(ds.accessible),
            )
        })
        .collect();
    aggregate(
        observations,
        &Phrasing {
            entities: "datastores",
            critical: "the following datastore(s) are inaccessible",
            warning: "the following datastore(s) may be inaccessible",
            unknown: "the following datastore(s) have unknown accessibility",
            ok: "all datastore(s) are accessible",
            table: "Accessibility of all datastores",
        },
    )
}

fn datastore_status(datastores: &[Datastore]) -> AggregateResult {
    let observations = datastores
        .iter()
        .map(|ds| {
            Observation::new(
                ds.name.clone(),
                Reading::State(ds.overall_status.clone().unwrap_or_default()),
                classify::categorical(ds.overall_status.as_deref()),
            )
        })
        .collect();
    aggregate(
        observations,
        &Phrasing {
            entities: "datastores",
            critical: "the following datastore(s) definitely have an issue",
            warning: "the following datastore(s) may have an issue",
            unknown: "the following datastore(s) are in an unknown state",
            ok: "all datastore(s) are in the green state",
            table: "Status of all datastores",
        },
    )
}

fn datastore_usage(datastores: &[Datastore], policy: &ThresholdPolicy) -> AggregateResult {
    let observations = datastores
        .iter()
        .map(|ds| {
            match classify::used_fraction_from_free(ds.free_space as f64, ds.capacity as f64) {
                Some(used) => Observation::new(
                    ds.name.clone(),
                    Reading::Ratio(used),
                    classify::fractional(used, policy),
                ),
                None => Observation::new(ds.name.clone(), Reading::Unavailable, Status::Unknown),
            }
        })
        .collect();
    aggregate(
        observations,
        &Phrasing {
            entities: "datastores",
            critical: "the following datastore(s) are in critical usage",
            warning: "the following datastore(s) have high usage",
            unknown: "the following datastore(s) have unknown usage",
            ok: "all datastore(s) have ample space",
            table: "Usage of all datastores",
        },
    )
}
