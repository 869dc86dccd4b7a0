//! Glue an invocation to a registered check and produce exactly one status
//!
//! Per invocation the runner:
//!
//! 1. resolves the measurement name in the `CheckRegistry`
//! 2. validates the thresholds, before anything talks to the network
//! 3. connects to the management plane and, for host checks, looks up the host
//! 4. evaluates the check
//! 5. hands the status and message to its `Reporter`
//!
//! Every failure along the way becomes `UNKNOWN`, a failed lookup is not
//! evidence that anything is actually broken.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::aggregate::AggregateResult;
use crate::checks::{CheckRegistry, Environment, Evaluation, TargetKind};
use crate::ping::Prober;
use crate::plane::{Connector, ManagementPlane, PlaneError};
use crate::threshold::InvalidThreshold;
use crate::Status;

/// The parameters of one invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub measurement: String,
    pub host: Option<String>,
    pub warning: Option<f64>,
    pub critical: Option<f64>,
}

/// Why a check could not produce a verdict
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("measurement {name} not understood, expected one of: {known}")]
    UnknownMeasurement { name: String, known: String },
    #[error("{0}")]
    InvalidThreshold(#[from] InvalidThreshold),
    #[error("measurement {0} checks an esxi host, pass one with --hostname")]
    HostRequired(String),
    #[error("esxi hostname {host} does not exist on vSphere {endpoint}")]
    TargetNotFound { host: String, endpoint: String },
    #[error("unable to reach vSphere {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: PlaneError,
    },
    #[error("error during execution of {check}: {source}")]
    EvaluationFailure {
        check: String,
        #[source]
        source: PlaneError,
    },
    #[error("{check} crashed: {message}")]
    Panicked { check: String, message: String },
}

impl CheckError {
    /// Always `Unknown`: only a real classification may claim anything else
    pub fn status(&self) -> Status {
        Status::Unknown
    }
}

/// Where the final status line goes
pub trait Reporter {
    fn report(&self, status: Status, message: &str);
}

/// Print the message to stdout, for the monitoring supervisor
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    fn report(&self, _: Status, message: &str) {
        println!("{}", message);
    }
}

pub struct CheckRunner<C, R> {
    registry: CheckRegistry,
    connector: C,
    prober: Box<dyn Prober>,
    reporter: R,
}

impl<C: Connector, R: Reporter> CheckRunner<C, R> {
    pub fn new(
        registry: CheckRegistry,
        connector: C,
        prober: Box<dyn Prober>,
        reporter: R,
    ) -> CheckRunner<C, R> {
        CheckRunner {
            registry,
            connector,
            prober,
            reporter,
        }
    }

    /// Run the invocation through to a verdict, without reporting it
    ///
    /// A panic anywhere in the pipeline, including in the connector or the
    /// management plane, becomes `CheckError::Panicked`.
    pub fn evaluate(&self, invocation: &Invocation) -> Result<AggregateResult, CheckError> {
        guarded(&invocation.measurement, || self.pipeline(invocation))
    }

    fn pipeline(&self, invocation: &Invocation) -> Result<AggregateResult, CheckError> {
        let check = self
            .registry
            .get(&invocation.measurement)
            .ok_or_else(|| CheckError::UnknownMeasurement {
                name: invocation.measurement.clone(),
                known: self.registry.names().join(", "),
            })?;
        let policy = check
            .defaults()
            .with_overrides(invocation.warning, invocation.critical)?;
        debug!(check = check.name(), target = %check.target_kind(), %policy, "resolved check");

        let host_name = match check.target_kind() {
            TargetKind::Host => Some(
                invocation
                    .host
                    .as_deref()
                    .ok_or_else(|| CheckError::HostRequired(check.name().to_owned()))?,
            ),
            TargetKind::System => {
                if let Some(ref host) = invocation.host {
                    debug!(host = %host, "ignoring hostname for system check");
                }
                None
            }
        };

        let endpoint = self.connector.endpoint().to_owned();
        let plane = self
            .connector
            .connect()
            .map_err(|source| CheckError::Connection {
                endpoint: endpoint.clone(),
                source,
            })?;
        let failed = |source| CheckError::EvaluationFailure {
            check: check.name().to_owned(),
            source,
        };

        info!("calling check {}", check.name());
        match (check.evaluation(), host_name) {
            (Evaluation::Host(evaluate), Some(name)) => {
                let host = plane
                    .find_host(name)
                    .map_err(failed)?
                    .ok_or_else(|| CheckError::TargetNotFound {
                        host: name.to_owned(),
                        endpoint,
                    })?;
                Ok(evaluate(&host, &policy))
            }
            (Evaluation::System(evaluate), _) => {
                let env = Environment {
                    plane: &plane,
                    prober: self.prober.as_ref(),
                };
                evaluate(&env, &policy).map_err(failed)
            }
            (Evaluation::Host(_), None) => Err(CheckError::HostRequired(check.name().to_owned())),
        }
    }

    /// Evaluate, report, and return the status the process should exit with
    pub fn run(&self, invocation: &Invocation) -> Status {
        let (status, message) = match self.evaluate(invocation) {
            Ok(result) => {
                let status = result.overall();
                match status {
                    Status::Ok | Status::Unknown => info!("{}", result.message()),
                    Status::Warning => warn!("{}", result.message()),
                    Status::Critical => error!("{}", result.message()),
                }
                (status, result.message().to_owned())
            }
            Err(e) => {
                error!(error = ?e, "check {} failed", invocation.measurement);
                (e.status(), format!("{}: {}", e.status(), e))
            }
        };
        self.reporter.report(status, &message);
        status
    }
}

/// Turn a panic inside the pipeline into an error
fn guarded<F>(check: &str, evaluate: F) -> Result<AggregateResult, CheckError>
where
    F: FnOnce() -> Result<AggregateResult, CheckError>,
{
    catch_unwind(AssertUnwindSafe(evaluate)).unwrap_or_else(|payload| {
        Err(CheckError::Panicked {
            check: check.to_owned(),
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::cell::{Cell, RefCell};
    use std::io;
    use std::time::Duration;

    use crate::inventory::test::sample;
    use crate::inventory::Inventory;
    use crate::ping::Reachability;
    use crate::plane::{Datastore, Host, Network, Task, VirtualMachine};

    struct FakeConnector {
        inventory: Option<Inventory>,
        connects: Cell<u32>,
    }

    impl FakeConnector {
        fn with(inventory: Inventory) -> FakeConnector {
            FakeConnector {
                inventory: Some(inventory),
                connects: Cell::new(0),
            }
        }

        fn unreachable() -> FakeConnector {
            FakeConnector {
                inventory: None,
                connects: Cell::new(0),
            }
        }
    }

    impl<'a> Connector for &'a FakeConnector {
        type Plane = Inventory;

        fn endpoint(&self) -> &str {
            "vcenter.test"
        }

        fn connect(&self) -> Result<Inventory, PlaneError> {
            self.connects.set(self.connects.get() + 1);
            self.inventory.clone().ok_or(PlaneError::BadStatus {
                endpoint: "vcenter.test".into(),
                status: 503,
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        reports: RefCell<Vec<(Status, String)>>,
    }

    impl<'a> Reporter for &'a Recorder {
        fn report(&self, status: Status, message: &str) {
            self.reports.borrow_mut().push((status, message.to_owned()));
        }
    }

    struct AlwaysUp;

    impl Prober for AlwaysUp {
        fn probe(&self, _: &str) -> io::Result<Reachability> {
            Ok(Reachability::Up)
        }
    }

    fn runner<'a>(
        connector: &'a FakeConnector,
        recorder: &'a Recorder,
    ) -> CheckRunner<&'a FakeConnector, &'a Recorder> {
        CheckRunner::new(
            CheckRegistry::standard(),
            connector,
            Box::new(AlwaysUp),
            recorder,
        )
    }

    fn invocation(measurement: &str, host: Option<&str>) -> Invocation {
        Invocation {
            measurement: measurement.into(),
            host: host.map(Into::into),
            ..Invocation::default()
        }
    }

    #[test]
    fn unknown_measurement_is_unknown_and_named() {
        let connector = FakeConnector::with(sample());
        let recorder = Recorder::default();
        let status = runner(&connector, &recorder).run(&invocation("bogus", None));
        assert_eq!(status, Status::Unknown);
        assert_eq!(status.exit_code(), 3);
        let reports = recorder.reports.borrow();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].1.starts_with("UNKNOWN: measurement bogus not understood"));
        assert_eq!(connector.connects.get(), 0);
    }

    #[test]
    fn invalid_thresholds_never_connect() {
        let connector = FakeConnector::with(sample());
        let recorder = Recorder::default();
        let inv = Invocation {
            warning: Some(0.9),
            critical: Some(0.75),
            ..invocation("host_cpu", Some("esx1"))
        };
        let status = runner(&connector, &recorder).run(&inv);
        assert_eq!(status, Status::Unknown);
        assert_eq!(connector.connects.get(), 0);
        assert_eq!(
            recorder.reports.borrow()[0].1,
            "UNKNOWN: warning value 0.9 can not be greater than critical value 0.75"
        );
    }

    #[test]
    fn host_checks_need_a_host() {
        let connector = FakeConnector::with(sample());
        let recorder = Recorder::default();
        match runner(&connector, &recorder).evaluate(&invocation("host_status", None)) {
            Err(CheckError::HostRequired(name)) => assert_eq!(name, "host_status"),
            other => panic!("expected HostRequired, got {:?}", other),
        }
        assert_eq!(connector.connects.get(), 0);
    }

    #[test]
    fn missing_host_is_unknown() {
        let connector = FakeConnector::with(sample());
        let recorder = Recorder::default();
        let status = runner(&connector, &recorder).run(&invocation("host_status", Some("esx9")));
        assert_eq!(status, Status::Unknown);
        assert_eq!(
            recorder.reports.borrow()[0].1,
            "UNKNOWN: esxi hostname esx9 does not exist on vSphere vcenter.test"
        );
    }

    #[test]
    fn connection_failures_are_unknown_not_critical() {
        let connector = FakeConnector::unreachable();
        let recorder = Recorder::default();
        let status = runner(&connector, &recorder).run(&invocation("system_datastore_status", None));
        assert_eq!(status, Status::Unknown);
        assert_eq!(connector.connects.get(), 1);
        assert!(recorder.reports.borrow()[0]
            .1
            .contains("unable to reach vSphere vcenter.test"));
    }

    #[test]
    fn lookup_failures_are_evaluation_failures() {
        let connector = FakeConnector::with(sample());
        let recorder = Recorder::default();
        // esx2 references a datastore that is not in the inventory
        match runner(&connector, &recorder).evaluate(&invocation("host_status", Some("esx2"))) {
            Err(CheckError::EvaluationFailure { check, .. }) => assert_eq!(check, "host_status"),
            other => panic!("expected EvaluationFailure, got {:?}", other),
        }
    }

    #[test]
    fn host_check_end_to_end() {
        let connector = FakeConnector::with(sample());
        let recorder = Recorder::default();
        let status = runner(&connector, &recorder).run(&invocation("host_cpu", Some("esx1")));
        assert_eq!(status, Status::Ok);
        assert_eq!(
            recorder.reports.borrow()[0],
            (
                Status::Ok,
                "OK: cpu usage of host esx1 is 60.0% (warning at 75.0%)".to_owned()
            )
        );

        let inv = Invocation {
            warning: Some(0.5),
            ..invocation("host_cpu", Some("esx1"))
        };
        assert_eq!(runner(&connector, &recorder).run(&inv), Status::Warning);
    }

    #[test]
    fn system_check_ignores_hostname() {
        let connector = FakeConnector::with(sample());
        let recorder = Recorder::default();
        let status = runner(&connector, &recorder)
            .run(&invocation("system_datastore_status", Some("not-a-host")));
        assert_eq!(status, Status::Critical);
        assert!(recorder.reports.borrow()[0].1.contains("ds3 (red)"));
    }

    #[test]
    fn task_thresholds_default_to_counts() {
        let connector = FakeConnector::with(sample());
        let recorder = Recorder::default();
        let r = runner(&connector, &recorder);
        assert_eq!(r.run(&invocation("system_tasks", None)), Status::Ok);

        // only the critical side given: warn keeps its default of 7
        let inv = Invocation {
            critical: Some(3.0),
            ..invocation("system_tasks", None)
        };
        assert_eq!(r.run(&inv), Status::Unknown);
    }

    struct PanickyPlane;

    impl ManagementPlane for PanickyPlane {
        fn find_host(&self, _: &str) -> Result<Option<Host>, PlaneError> {
            panic!("host lookup exploded")
        }
        fn datastores(&self) -> Result<Vec<Datastore>, PlaneError> {
            panic!("datastore list exploded")
        }
        fn virtual_machines(&self) -> Result<Vec<VirtualMachine>, PlaneError> {
            Ok(vec![])
        }
        fn networks(&self) -> Result<Vec<Network>, PlaneError> {
            Ok(vec![])
        }
        fn recent_tasks(&self, _: Duration) -> Result<Vec<Task>, PlaneError> {
            Ok(vec![])
        }
    }

    struct PanickyConnector;

    impl Connector for PanickyConnector {
        type Plane = PanickyPlane;

        fn endpoint(&self) -> &str {
            "panic.test"
        }

        fn connect(&self) -> Result<PanickyPlane, PlaneError> {
            Ok(PanickyPlane)
        }
    }

    #[test]
    fn panics_become_unknown() {
        let recorder = Recorder::default();
        let runner = CheckRunner::new(
            CheckRegistry::standard(),
            PanickyConnector,
            Box::new(AlwaysUp),
            &recorder,
        );
        let status = runner.run(&invocation("system_datastore_usage", None));
        assert_eq!(status, Status::Unknown);
        assert_eq!(
            recorder.reports.borrow()[0].1,
            "UNKNOWN: system_datastore_usage crashed: datastore list exploded"
        );
        assert_eq!(
            runner.run(&invocation("system_network_accessibility", None)),
            Status::Ok
        );
    }

    struct ExplodingConnector;

    impl Connector for ExplodingConnector {
        type Plane = Inventory;

        fn endpoint(&self) -> &str {
            "boom.test"
        }

        fn connect(&self) -> Result<Inventory, PlaneError> {
            panic!("connect exploded")
        }
    }

    #[test]
    fn connector_panics_become_unknown() {
        let recorder = Recorder::default();
        let runner = CheckRunner::new(
            CheckRegistry::standard(),
            ExplodingConnector,
            Box::new(AlwaysUp),
            &recorder,
        );
        let status = runner.run(&invocation("system_datastore_status", None));
        assert_eq!(status, Status::Unknown);
        assert_eq!(
            recorder.reports.borrow()[0],
            (
                Status::Unknown,
                "UNKNOWN: system_datastore_status crashed: connect exploded".to_owned()
            )
        );
    }

    #[test]
    fn host_lookup_panics_become_unknown() {
        let recorder = Recorder::default();
        let runner = CheckRunner::new(
            CheckRegistry::standard(),
            PanickyConnector,
            Box::new(AlwaysUp),
            &recorder,
        );
        match runner.evaluate(&invocation("host_status", Some("esx1"))) {
            Err(CheckError::Panicked { check, message }) => {
                assert_eq!(check, "host_status");
                assert_eq!(message, "host lookup exploded");
            }
            other => panic!("expected Panicked, got {:?}", other),
        }
    }
}
