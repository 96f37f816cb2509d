//! Writes JSON-serialised reports per service to standard output.
//! Provided for operators and tests; makes no runtime decisions.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::service::ServiceReport;

use super::Router;

/// Trivial router that serialises each service's reports to stdout.
#[derive(Debug, Default)]
pub struct ConsoleRouter;

impl ConsoleRouter {
    /// Construct a new console router. It holds no state of its own.
    pub fn new() -> ConsoleRouter {
        ConsoleRouter
    }
}

#[async_trait]
impl Router for ConsoleRouter {
    async fn update(&self, batch: &[ServiceReport]) -> CoreResult<()> {
        for service_report in batch {
            let line = serde_json::json!({
                "service": service_report.service.name,
                "reports": service_report.reports,
            });
            println!("{}", line);
        }
        Ok(())
    }

    fn kind_label(&self) -> &'static str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Report, ServerSort};
    use crate::service::Service;
    use serde_json::Value;
    use std::sync::Arc;

    #[tokio::test]
    async fn update_never_fails() {
        let service = Arc::new(Service::new(
            Some("web".into()),
            "/web",
            Value::Null,
            Value::Null,
            Value::Null,
            ServerSort::Name,
            None,
        ));
        let report = Report {
            name: "a".into(),
            host: "10.0.0.1".into(),
            port: 8080,
            available: None,
            weight: None,
            haproxy_server_options: None,
            labels: Default::default(),
            unavailable_reason: None,
            creation_time: 0,
        };
        let batch = vec![ServiceReport {
            service,
            reports: vec![report],
        }];

        let router = ConsoleRouter::new();
        router.update(&batch).await.unwrap();
    }
}
