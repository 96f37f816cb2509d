//! A single published instance of a backend server.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// One server's availability/identity record, as published by a
/// health-reporting agent into the registry.
///
/// `available` is tri-state in the wire format: present-and-true,
/// present-and-false, or absent (treated as available). We collapse
/// that onto `Option<bool>` and expose [`Report::is_available`] for
/// the absent-means-available rule.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Report {
    /// Stable identifier within a service.
    pub name: String,
    /// Backend host.
    pub host: String,
    /// Backend port.
    pub port: u16,
    /// Tri-state availability; `None` means "available".
    #[serde(default)]
    pub available: Option<bool>,
    /// Optional HAProxy server weight.
    #[serde(default)]
    pub weight: Option<u32>,
    /// Free-form options string appended verbatim to the rendered
    /// `server` line.
    #[serde(default)]
    pub haproxy_server_options: Option<String>,
    /// Arbitrary operator-supplied labels.
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Free-form explanation for why the server is unavailable.
    #[serde(default)]
    pub unavailable_reason: Option<String>,
    /// Monotonic-ish sequence number derived from the registry node's
    /// creation timestamp. Used only for ordering (`server_sort: date`).
    #[serde(default)]
    pub creation_time: i64,
}

impl Report {
    /// Absent `available` means available; this is the one predicate
    /// every other piece of the pipeline defers to.
    pub fn is_available(&self) -> bool {
        self.available.unwrap_or(true)
    }

    /// Clone of this report with `available` forced to `false` and
    /// identifying fields preserved, used to re-attach servers that
    /// disappeared from a new event as explicitly unavailable rather
    /// than silently dropping them.
    pub fn as_unavailable(&self) -> Report {
        Report {
            available: Some(false),
            ..self.clone()
        }
    }
}

/// How to order a service's reports before handing them to the typed
/// router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerSort {
    /// Uniform random permutation.
    Random,
    /// Ascending by `name`.
    Name,
    /// Ascending by `creation_time` (earliest first).
    Date,
}

impl Default for ServerSort {
    fn default() -> Self {
        ServerSort::Random
    }
}

impl ServerSort {
    /// Sort `reports` in place according to this strategy.
    pub fn sort(self, reports: &mut [Report]) {
        match self {
            ServerSort::Random => reports.shuffle(&mut rand::thread_rng()),
            ServerSort::Name => reports.sort_by(|a, b| a.name.cmp(&b.name)),
            ServerSort::Date => reports.sort_by_key(|r| r.creation_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_available_means_available() {
        let report = Report {
            name: "a".into(),
            host: "10.0.0.1".into(),
            port: 8080,
            available: None,
            weight: None,
            haproxy_server_options: None,
            labels: HashMap::new(),
            unavailable_reason: None,
            creation_time: 0,
        };
        assert!(report.is_available());
    }

    #[test]
    fn as_unavailable_preserves_identity() {
        let report = Report {
            name: "a".into(),
            host: "10.0.0.1".into(),
            port: 8080,
            available: Some(true),
            weight: Some(10),
            haproxy_server_options: None,
            labels: HashMap::new(),
            unavailable_reason: None,
            creation_time: 0,
        };
        let gone = report.as_unavailable();
        assert_eq!(gone.name, "a");
        assert_eq!(gone.weight, Some(10));
        assert_eq!(gone.available, Some(false));
    }

    #[test]
    fn sort_by_name_is_ascending() {
        let mut reports = vec![
            mk("c", 2),
            mk("a", 1),
            mk("b", 0),
        ];
        ServerSort::Name.sort(&mut reports);
        let names: Vec<_> = reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn sort_by_date_is_ascending() {
        let mut reports = vec![mk("c", 2), mk("a", 1), mk("b", 0)];
        ServerSort::Date.sort(&mut reports);
        let times: Vec<_> = reports.iter().map(|r| r.creation_time).collect();
        assert_eq!(times, vec![0, 1, 2]);
    }

    fn mk(name: &str, creation_time: i64) -> Report {
        Report {
            name: name.into(),
            host: "10.0.0.1".into(),
            port: 8080,
            available: None,
            weight: None,
            haproxy_server_options: None,
            labels: HashMap::new(),
            unavailable_reason: None,
            creation_time,
        }
    }
}
