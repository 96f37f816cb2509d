//! Per-service rule that filters a service's reports based on another
//! service's current reports, used for active/standby topologies where
//! a standby pool must exclude whichever peer is currently primary.

use serde::{Deserialize, Serialize};

use crate::report::Report;

/// The only supported correlation kind. Any other `type` value fails
/// the owning service at init.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CorrelationType {
    /// Remove from this service's reports any server whose `name`
    /// matches the correlated service's report, per `scope`.
    ExcludeServer,
}

/// The only supported scope. Any other value fails the owning service
/// at init.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationScope {
    /// Only the other service's first report (after its own sort)
    /// participates in the exclusion.
    First,
}

/// A service's correlation declaration.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Correlation {
    /// Discriminant. Only `excludeServer` is implemented.
    #[serde(rename = "type")]
    pub kind: CorrelationType,
    /// Name of the other service to correlate against.
    pub other_service_name: String,
    /// Discriminant. Only `first` is implemented.
    pub scope: CorrelationScope,
}

impl Correlation {
    /// Apply this correlation to `reports`, given the other service's
    /// last dispatched (already sorted) report list. A non-empty other
    /// report excludes any server in `reports` whose name matches its
    /// first entry; an empty or absent other report is a no-op.
    pub fn apply(&self, reports: Vec<Report>, other_last_dispatched: Option<&[Report]>) -> Vec<Report> {
        let Some(other) = other_last_dispatched else {
            return reports;
        };
        let Some(excluded) = other.first() else {
            return reports;
        };

        reports
            .into_iter()
            .filter(|r| r.name != excluded.name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn report(name: &str) -> Report {
        Report {
            name: name.into(),
            host: "10.0.0.1".into(),
            port: 8080,
            available: None,
            weight: None,
            haproxy_server_options: None,
            labels: HashMap::new(),
            unavailable_reason: None,
            creation_time: 0,
        }
    }

    #[test]
    fn excludes_primary_from_standby() {
        let correlation = Correlation {
            kind: CorrelationType::ExcludeServer,
            other_service_name: "primary".into(),
            scope: CorrelationScope::First,
        };

        let backup_reports = vec![report("p1"), report("b1"), report("b2")];
        let primary_last = vec![report("p1")];

        let filtered = correlation.apply(backup_reports, Some(&primary_last));
        let names: Vec<_> = filtered.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b1", "b2"]);
    }

    #[test]
    fn no_op_when_other_service_has_never_reported() {
        let correlation = Correlation {
            kind: CorrelationType::ExcludeServer,
            other_service_name: "primary".into(),
            scope: CorrelationScope::First,
        };

        let backup_reports = vec![report("b1")];
        let filtered = correlation.apply(backup_reports.clone(), None);
        assert_eq!(filtered, backup_reports);
    }
}
