//! Documentation about the scripts contained herein
//!
//! - [check-vmware](#check-vmware)
//!
//! # check-vmware
//!
//! Cross platform, only requires access to a vCenter inventory endpoint. The
//! `system_ping_vms` measurement also needs a `ping` binary on the `PATH`.
//!
//! ```plain
//! $ check-vmware --help
//! check-vmware (part of vsphere-plugins) 0.1.0
//! Check the health of vSphere hosts and vCenter inventories
//!
//! USAGE:
//!     check-vmware [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -h, --help           Prints help information
//!         --list-checks    List every known measurement and exit
//!         --version        Prints version information
//!     -v, --verbose        Log diagnostics to stderr, repeat for more detail
//!
//! OPTIONS:
//!     -c, --critical <critical>          Critical value for the check, e.g. 0.9
//!     -H, --hostname <hostname>          Name of the esxi host to check
//!     -m, --measurement <measurement>    The check to run
//!     -p, --password <password>          Password for the vSphere endpoint [env: VSPHERE_PASSWORD]
//!         --retries <retries>            How many times to retry reaching the endpoint [default: 2]
//!         --timeout <seconds>            Seconds to wait for each request to the endpoint [default: 10]
//!     -u, --user <user>                  User to authenticate as
//!     -V, --vsphere <vsphere>            vCenter inventory endpoint: an http(s) URL or a path to an inventory JSON
//!                                        file
//!     -w, --warning <warning>            Warning value for the check, e.g. 0.8
//!
//! About measurements:
//!
//!     Checks starting with `host_` evaluate the esxi host named by --hostname,
//!     checks starting with `system_` evaluate everything vCenter knows about.
//!     Run with --list-checks to see them all.
//!
//!     --warning and --critical are fractions (0.8 is 80%) for usage checks and
//!     task counts for `system_tasks`. When omitted, usage checks warn at 0.75 and
//!     go critical above 0.9, `system_tasks` warns above 7 and goes critical
//!     above 15 failed tasks.
//!
//! Exit codes:
//!
//!     0 OK, 1 WARNING, 2 CRITICAL, 3 UNKNOWN. Bad arguments, unknown hosts and
//!     unreachable endpoints are all UNKNOWN.
//!
//! Environment:
//!
//!     VSPHERE_PASSWORD    Used when --password is not given
//!     CHECK_VMWARE_LOG    Log filter for stderr diagnostics, e.g. `debug`
//! ```
//!
//! ```plain
//! $ check-vmware --list-checks
//! host_status                      host    Overall status (green/yellow/red) of the host
//! host_cpu                         host    CPU usage of the host as a fraction of its total clock speed
//! host_memory                      host    Memory usage of the host as a fraction of its total memory
//! host_datastore_accessibility     host    Every datastore mounted on the host is accessible
//! host_datastore_status            host    Overall status of every datastore mounted on the host
//! host_datastore_usage             host    Used capacity of every datastore mounted on the host
//! system_datastore_accessibility   system  Every datastore in vCenter is accessible
//! system_datastore_status          system  Overall status of every datastore in vCenter
//! system_datastore_usage           system  Used capacity of every datastore in vCenter
//! system_connection_vms            system  Every VM is connected
//! system_ping_vms                  system  Every powered on VM with an IP address answers a ping
//! system_network_accessibility     system  Every network defined in vCenter is accessible
//! system_tasks                     system  Number of tasks that failed in the last 10 minutes
//! ```
