//! The management plane, as the checks see it
//!
//! Checks only ever read from a [`ManagementPlane`]. Producing one (logging
//! in, fetching, retrying) is the job of a [`Connector`]; the `inventory`
//! module has the implementation the binary uses.

use std::io;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Anything that can go wrong talking to the management plane
#[derive(Debug, Error)]
pub enum PlaneError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid inventory document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{endpoint} responded with {status}")]
    BadStatus { endpoint: String, status: u16 },
    #[error("host {host} references unknown datastore {datastore}")]
    DanglingDatastore { host: String, datastore: String },
    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),
}

/// A read-only view of the infrastructure
pub trait ManagementPlane {
    /// Look up an ESXi host by name, `None` if the plane does not know it
    fn find_host(&self, name: &str) -> Result<Option<Host>, PlaneError>;

    fn datastores(&self) -> Result<Vec<Datastore>, PlaneError>;

    fn virtual_machines(&self) -> Result<Vec<VirtualMachine>, PlaneError>;

    fn networks(&self) -> Result<Vec<Network>, PlaneError>;

    /// Tasks that completed within `window` of now, or have not completed
    fn recent_tasks(&self, window: Duration) -> Result<Vec<Task>, PlaneError>;
}

/// Establishes a session with the management plane
pub trait Connector {
    type Plane: ManagementPlane;

    /// Human readable name of the endpoint, for messages
    fn endpoint(&self) -> &str;

    fn connect(&self) -> Result<Self::Plane, PlaneError>;
}

/// An ESXi host with the datastores mounted on it
#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    pub name: String,
    pub overall_status: Option<String>,
    pub quick_stats: QuickStats,
    pub hardware: Hardware,
    pub datastores: Vec<Datastore>,
}

impl Host {
    /// The total clock speed of the host in MHz
    pub fn cpu_capacity_mhz(&self) -> f64 {
        let cpu = &self.hardware.cpu_info;
        (cpu.hz as f64 / 1024.0 / 1024.0) * f64::from(cpu.num_cpu_cores)
    }

    pub fn memory_capacity_mb(&self) -> f64 {
        self.hardware.memory_size as f64 / 1024.0 / 1024.0
    }
}

/// Summary usage counters of a host
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickStats {
    /// MHz in use across all cores
    #[serde(default)]
    pub overall_cpu_usage: u64,
    /// MB of memory in use
    #[serde(default)]
    pub overall_memory_usage: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Hardware {
    pub cpu_info: CpuInfo,
    /// Bytes
    pub memory_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CpuInfo {
    pub hz: u64,
    pub num_cpu_cores: u16,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastore {
    pub name: String,
    #[serde(default)]
    pub overall_status: Option<String>,
    #[serde(default)]
    pub accessible: bool,
    /// Bytes
    #[serde(default)]
    pub capacity: u64,
    /// Bytes
    #[serde(default)]
    pub free_space: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    pub name: String,
    #[serde(default)]
    pub power_state: Option<String>,
    #[serde(default)]
    pub connection_state: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

impl VirtualMachine {
    pub fn is_running(&self) -> bool {
        self.power_state.as_deref() == Some("poweredOn")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,
    #[serde(default)]
    pub accessible: bool,
}

/// A task from the task manager's recent task list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub description_id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub entity_name: String,
    /// The fault message, if the task failed
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub complete_time: Option<DateTime<Utc>>,
}

impl Task {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}
