//! A vCenter inventory snapshot, and how to fetch it
//!
//! The inventory is a JSON document using the vSphere managed object
//! property names, exported by whatever sits next to vCenter:
//!
//! ```json
//! {
//!     "hosts": [{
//!         "name": "esx1.example.com",
//!         "overallStatus": "green",
//!         "quickStats": {"overallCpuUsage": 2000, "overallMemoryUsage": 4096},
//!         "hardware": {"cpuInfo": {"hz": 2100000000, "numCpuCores": 8},
//!                      "memorySize": 68719476736},
//!         "datastore": ["datastore1"]
//!     }],
//!     "datastores": [{"name": "datastore1", "overallStatus": "green",
//!                     "accessible": true, "capacity": 100, "freeSpace": 40}],
//!     "vms": [{"name": "web", "powerState": "poweredOn",
//!              "connectionState": "connected", "ipAddress": "10.0.0.5"}],
//!     "networks": [{"name": "VM Network", "accessible": true}],
//!     "tasks": [{"descriptionId": "VirtualMachine.powerOn", "state": "error",
//!                "entityName": "web", "error": "Insufficient resources",
//!                "completeTime": "2024-03-01T10:00:00Z"}]
//! }
//! ```
//!
//! Every collection is optional and defaults to empty.

use std::fs;
use std::thread::sleep;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::plane::{
    Connector, Datastore, Hardware, Host, ManagementPlane, Network, PlaneError, QuickStats, Task,
    VirtualMachine,
};

/// The whole inventory, as deserialized
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    hosts: Vec<HostRecord>,
    #[serde(default)]
    datastores: Vec<Datastore>,
    #[serde(default)]
    vms: Vec<VirtualMachine>,
    #[serde(default)]
    networks: Vec<Network>,
    #[serde(default)]
    tasks: Vec<Task>,
}

/// A host as it appears in the document, datastores referenced by name
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostRecord {
    name: String,
    #[serde(default)]
    overall_status: Option<String>,
    #[serde(default)]
    quick_stats: QuickStats,
    #[serde(default)]
    hardware: Hardware,
    #[serde(default)]
    datastore: Vec<String>,
}

impl Inventory {
    pub fn from_json(s: &str) -> Result<Inventory, PlaneError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Tasks that completed at or after `cutoff`, plus those still running
    pub fn tasks_since(&self, cutoff: DateTime<Utc>) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|task| task.complete_time.map_or(true, |done| done >= cutoff))
            .cloned()
            .collect()
    }

    fn resolve(&self, record: &HostRecord) -> Result<Host, PlaneError> {
        let datastores = record
            .datastore
            .iter()
            .map(|name| {
                self.datastores
                    .iter()
                    .find(|ds| ds.name == *name)
                    .cloned()
                    .ok_or_else(|| PlaneError::DanglingDatastore {
                        host: record.name.clone(),
                        datastore: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Host {
            name: record.name.clone(),
            overall_status: record.overall_status.clone(),
            quick_stats: record.quick_stats.clone(),
            hardware: record.hardware.clone(),
            datastores,
        })
    }
}

impl ManagementPlane for Inventory {
    fn find_host(&self, name: &str) -> Result<Option<Host>, PlaneError> {
        match self.hosts.iter().find(|h| h.name == name) {
            Some(record) => self.resolve(record).map(Some),
            None => Ok(None),
        }
    }

    fn datastores(&self) -> Result<Vec<Datastore>, PlaneError> {
        Ok(self.datastores.clone())
    }

    fn virtual_machines(&self) -> Result<Vec<VirtualMachine>, PlaneError> {
        Ok(self.vms.clone())
    }

    fn networks(&self) -> Result<Vec<Network>, PlaneError> {
        Ok(self.networks.clone())
    }

    fn recent_tasks(&self, window: Duration) -> Result<Vec<Task>, PlaneError> {
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|window| Utc::now().checked_sub_signed(window));
        match cutoff {
            Some(cutoff) => Ok(self.tasks_since(cutoff)),
            None => Ok(self.tasks.clone()),
        }
    }
}

/// Where the inventory lives
#[derive(Debug, Clone, PartialEq)]
enum Source {
    Http(reqwest::Url),
    File(String),
}

impl Source {
    fn parse(endpoint: &str) -> Result<Source, PlaneError> {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            reqwest::Url::parse(endpoint)
                .map(Source::Http)
                .map_err(|e| PlaneError::InvalidEndpoint(format!("{}: {}", endpoint, e)))
        } else if let Some(path) = endpoint.strip_prefix("file://") {
            Ok(Source::File(path.to_owned()))
        } else if endpoint.contains("://") {
            Err(PlaneError::InvalidEndpoint(format!(
                "{}: only http, https and file are supported",
                endpoint
            )))
        } else {
            Ok(Source::File(endpoint.to_owned()))
        }
    }
}

/// Longest pause between two attempts, however many retries are allowed
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Fetches an `Inventory` over HTTP(S) or from disk
#[derive(Debug, Clone)]
pub struct InventoryClient {
    endpoint: String,
    user: Option<String>,
    password: Option<String>,
    timeout: Duration,
    retries: u8,
    backoff: Duration,
}

impl InventoryClient {
    pub fn new<S: Into<String>>(endpoint: S) -> InventoryClient {
        InventoryClient {
            endpoint: endpoint.into(),
            user: None,
            password: None,
            timeout: Duration::from_secs(10),
            retries: 2,
            backoff: Duration::from_secs(1),
        }
    }

    pub fn credentials(mut self, user: Option<String>, password: Option<String>) -> Self {
        self.user = user;
        self.password = password;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    /// Pause before the first retry, doubled for each one after it
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff.min(MAX_BACKOFF);
        self
    }

    /// Load the inventory, retrying transient HTTP failures with a doubling
    /// back-off capped at 30 seconds. At most `retries + 1` attempts are made.
    pub fn fetch(&self) -> Result<Inventory, PlaneError> {
        let url = match Source::parse(&self.endpoint)? {
            Source::File(path) => {
                debug!(path = %path, "reading inventory from file");
                let contents = fs::read_to_string(&path)?;
                return Inventory::from_json(&contents);
            }
            Source::Http(url) => url,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let mut attempts = 0;
        let mut retry_sleep = self.backoff;
        loop {
            match self.get(&client, &url) {
                Ok(inventory) => return Ok(inventory),
                Err(e) => {
                    if attempts < self.retries && is_transient(&e) {
                        warn!(
                            "error fetching {}: {}, retrying in {}ms",
                            url,
                            e,
                            retry_sleep.as_millis()
                        );
                        attempts += 1;
                        sleep(retry_sleep);
                        retry_sleep = next_backoff(retry_sleep);
                    } else {
                        info!("giving up on {} after {} attempts", url, attempts + 1);
                        return Err(e);
                    }
                }
            }
        }
    }

    fn get(
        &self,
        client: &reqwest::blocking::Client,
        url: &reqwest::Url,
    ) -> Result<Inventory, PlaneError> {
        debug!(url = %url, user = ?self.user, "fetching inventory");
        let mut request = client.get(url.clone());
        if let Some(ref user) = self.user {
            request = request.basic_auth(user, self.password.as_ref());
        }
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(PlaneError::BadStatus {
                endpoint: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text()?;
        Inventory::from_json(&body)
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

fn is_transient(e: &PlaneError) -> bool {
    match *e {
        PlaneError::Http(_) => true,
        PlaneError::BadStatus { status, .. } => status >= 500,
        _ => false,
    }
}

impl Connector for InventoryClient {
    type Plane = Inventory;

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn connect(&self) -> Result<Inventory, PlaneError> {
        info!(endpoint = %self.endpoint, user = ?self.user, "connecting to management plane");
        self.fetch()
    }
}
