//! Reduce many per-entity statuses to one verdict
//!
//! The reduction is by precedence, never by majority: one critical datastore
//! makes the whole collection critical no matter how many are healthy. See
//! [`Status::precedence`](../enum.Status.html#method.precedence).

use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;

use crate::Status;

/// The raw value an entity was classified from
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// A used/total ratio, shown as a percentage
    Ratio(f64),
    Count(u64),
    /// A status word as the management plane reported it
    State(String),
    /// The value could not be computed
    Unavailable,
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Reading::Ratio(r) => write!(f, "{:.1}%", r * 100.0),
            Reading::Count(c) => write!(f, "{}", c),
            Reading::State(ref s) if s.is_empty() => write!(f, "<none>"),
            Reading::State(ref s) => write!(f, "{}", s),
            Reading::Unavailable => write!(f, "n/a"),
        }
    }
}

/// One classified entity
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    identifier: String,
    reading: Reading,
    status: Status,
}

impl Observation {
    pub fn new<S: Into<String>>(identifier: S, reading: Reading, status: Status) -> Observation {
        Observation {
            identifier: identifier.into(),
            reading,
            status,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn reading(&self) -> &Reading {
        &self.reading
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.identifier, self.reading)
    }
}

/// How a collection check talks about its entities
#[derive(Debug, Clone, Copy)]
pub struct Phrasing {
    /// Plural noun, used when there is nothing to check
    pub entities: &'static str,
    pub critical: &'static str,
    pub warning: &'static str,
    pub unknown: &'static str,
    pub ok: &'static str,
    /// Label of the full per-entity table
    pub table: &'static str,
}

impl Phrasing {
    fn headline(&self, status: Status) -> &'static str {
        match status {
            Status::Critical => self.critical,
            Status::Warning => self.warning,
            Status::Unknown => self.unknown,
            Status::Ok => self.ok,
        }
    }
}

/// The verdict of one check invocation
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    overall: Status,
    observations: Vec<Observation>,
    groups: HashMap<Status, Vec<Observation>>,
    message: String,
}

impl AggregateResult {
    /// Build a result whose overall status was decided by the caller
    pub fn new(overall: Status, observations: Vec<Observation>, message: String) -> AggregateResult {
        let mut groups: HashMap<Status, Vec<Observation>> = HashMap::new();
        for obs in &observations {
            groups.entry(obs.status).or_default().push(obs.clone());
        }
        AggregateResult {
            overall,
            observations,
            groups,
            message,
        }
    }

    /// A result about exactly one entity
    pub fn single(observation: Observation, message: String) -> AggregateResult {
        AggregateResult::new(observation.status, vec![observation], message)
    }

    pub fn overall(&self) -> Status {
        self.overall
    }

    /// Every observation, in the order the entities were reported
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// The observations that were classified as `status`
    pub fn group(&self, status: Status) -> &[Observation] {
        self.groups.get(&status).map_or(&[], |g| g.as_slice())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AggregateResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Reduce a collection to the status of its highest-precedence non-empty
/// group
///
/// An empty collection is `Ok`, and the message says nothing was found.
pub fn aggregate(observations: Vec<Observation>, phrasing: &Phrasing) -> AggregateResult {
    if observations.is_empty() {
        let message = format!("{}: no {} found", Status::Ok, phrasing.entities);
        return AggregateResult::new(Status::Ok, observations, message);
    }

    let overall = observations
        .iter()
        .fold(Status::Ok, |acc, obs| acc.worst(obs.status));

    let deciding = observations
        .iter()
        .filter(|obs| obs.status == overall)
        .join(", ");
    let message = format!(
        "{}: {}: {}\n{}: {}",
        overall,
        phrasing.headline(overall),
        deciding,
        phrasing.table,
        observations.iter().join(", ")
    );
    AggregateResult::new(overall, observations, message)
}

#[cfg(test)]
mod test {
    use super::*;

    const DATASTORES: Phrasing = Phrasing {
        entities: "datastores",
        critical: "the following datastore(s) definitely have an issue",
        warning: "the following datastore(s) may have an issue",
        unknown: "the following datastore(s) are in an unknown state",
        ok: "all datastore(s) are in the green state",
        table: "Status of all datastores",
    };

    fn obs(name: &str, state: &str, status: Status) -> Observation {
        Observation::new(name, Reading::State(state.into()), status)
    }

    #[test]
    fn one_critical_dominates_many_ok() {
        let mut all = (0..50)
            .map(|i| obs(&format!("ds{}", i), "green", Status::Ok))
            .collect::<Vec<_>>();
        all.push(obs("bad", "red", Status::Critical));
        all.push(obs("meh", "yellow", Status::Warning));
        all.push(obs("who", "gray", Status::Unknown));
        let result = aggregate(all, &DATASTORES);
        assert_eq!(result.overall(), Status::Critical);
        assert_eq!(result.group(Status::Critical).len(), 1);
        assert_eq!(result.group(Status::Ok).len(), 50);
        assert_eq!(result.observations().len(), 53);
    }

    #[test]
    fn warning_beats_unknown_beats_ok() {
        let result = aggregate(
            vec![
                obs("a", "gray", Status::Unknown),
                obs("b", "yellow", Status::Warning),
                obs("c", "green", Status::Ok),
            ],
            &DATASTORES,
        );
        assert_eq!(result.overall(), Status::Warning);

        let result = aggregate(
            vec![obs("a", "green", Status::Ok), obs("b", "", Status::Unknown)],
            &DATASTORES,
        );
        assert_eq!(result.overall(), Status::Unknown);
        assert_eq!(
            result.message(),
            "UNKNOWN: the following datastore(s) are in an unknown state: b (<none>)\n\
             Status of all datastores: a (green), b (<none>)"
        );
    }

    #[test]
    fn mixed_statuses_name_the_offender() {
        let result = aggregate(
            vec![
                obs("ds1", "green", Status::Ok),
                obs("ds2", "yellow", Status::Warning),
                obs("ds3", "red", Status::Critical),
            ],
            &DATASTORES,
        );
        assert_eq!(result.overall(), Status::Critical);
        assert_eq!(
            result.message(),
            "CRITICAL: the following datastore(s) definitely have an issue: ds3 (red)\n\
             Status of all datastores: ds1 (green), ds2 (yellow), ds3 (red)"
        );
    }

    #[test]
    fn all_ok_lists_everything() {
        let result = aggregate(
            vec![obs("ds1", "green", Status::Ok), obs("ds2", "green", Status::Ok)],
            &DATASTORES,
        );
        assert_eq!(result.overall(), Status::Ok);
        assert!(result
            .message()
            .starts_with("OK: all datastore(s) are in the green state: ds1 (green), ds2 (green)"));
    }

    #[test]
    fn empty_collection_is_ok_and_says_so() {
        let result = aggregate(vec![], &DATASTORES);
        assert_eq!(result.overall(), Status::Ok);
        assert_eq!(result.message(), "OK: no datastores found");
        assert!(result.group(Status::Ok).is_empty());
    }

    #[test]
    fn readings_display() {
        assert_eq!(Reading::Ratio(0.834).to_string(), "83.4%");
        assert_eq!(Reading::Count(3).to_string(), "3");
        assert_eq!(Reading::Unavailable.to_string(), "n/a");
    }
}
