//! Renders a user-supplied template over a full batch of reports,
//! atomically writes it to a destination path, then optionally runs a
//! post-command.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use handlebars::Handlebars;

use crate::error::{CoreError, CoreResult};
use crate::service::ServiceReport;

use super::Router;

/// Default destination file mode, matching the proxy configuration
/// files this router typically produces.
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Default timeout for the optional post-template command.
const DEFAULT_POST_COMMAND_TIMEOUT: Duration = Duration::from_millis(2000);

pub struct TemplateRouterConfig {
    pub template: String,
    pub destination: PathBuf,
    pub file_mode: u32,
    pub post_command: Option<Vec<String>>,
    pub post_command_timeout: Duration,
}

impl Default for TemplateRouterConfig {
    fn default() -> Self {
        TemplateRouterConfig {
            template: String::new(),
            destination: PathBuf::new(),
            file_mode: DEFAULT_FILE_MODE,
            post_command: None,
            post_command_timeout: DEFAULT_POST_COMMAND_TIMEOUT,
        }
    }
}

pub struct TemplateRouter {
    config: TemplateRouterConfig,
    renderer: Handlebars<'static>,
}

impl TemplateRouter {
    pub fn new(config: TemplateRouterConfig) -> TemplateRouter {
        TemplateRouter { config, renderer: Handlebars::new() }
    }
}

#[async_trait]
impl Router for TemplateRouter {
    async fn update(&self, batch: &[ServiceReport]) -> CoreResult<()> {
        let context = serde_json::json!({
            "services": batch
                .iter()
                .map(|sr| serde_json::json!({
                    "name": sr.service.name,
                    "reports": sr.reports,
                }))
                .collect::<Vec<_>>(),
        });

        let mut rendered = self
            .renderer
            .render_template(&self.config.template, &context)
            .map_err(|e| CoreError::Template(e.to_string()))?;
        if !rendered.ends_with('\n') {
            rendered.push('\n');
        }

        if let Some(parent) = self.config.destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| CoreError::Io {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }

        let tmp_path = self.config.destination.with_extension("tmp");
        tokio::fs::write(&tmp_path, rendered.as_bytes())
            .await
            .map_err(|e| CoreError::Io { path: tmp_path.display().to_string(), source: e })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(self.config.file_mode);
            tokio::fs::set_permissions(&tmp_path, permissions)
                .await
                .map_err(|e| CoreError::Io { path: tmp_path.display().to_string(), source: e })?;
        }

        tokio::fs::rename(&tmp_path, &self.config.destination)
            .await
            .map_err(|e| CoreError::Io { path: self.config.destination.display().to_string(), source: e })?;

        if let Some(command) = &self.config.post_command {
            if let Err(err) = run_post_command(command, self.config.post_command_timeout).await {
                return Err(CoreError::PostCommand(err.to_string()));
            }
        }

        Ok(())
    }

    fn kind_label(&self) -> &'static str {
        "template"
    }
}

async fn run_post_command(argv: &[String], timeout: Duration) -> anyhow::Result<()> {
    let (program, args) = argv.split_first().ok_or_else(|| anyhow::anyhow!("empty command"))?;

    let mut command = tokio::process::Command::new(program);
    command.args(args).stdin(Stdio::null()).kill_on_drop(true);

    let status = tokio::time::timeout(timeout, command.status())
        .await
        .map_err(|_| anyhow::anyhow!("post-template command timed out after {timeout:?}"))??;

    if !status.success() {
        anyhow::bail!("post-template command exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Report, ServerSort};
    use crate::service::Service;
    use serde_json::Value;
    use std::sync::Arc;

    #[tokio::test]
    async fn renders_and_writes_destination() {
        let dir = std::env::temp_dir().join(format!("synapse-template-test-{}", std::process::id()));
        let destination = dir.join("out.conf");

        let config = TemplateRouterConfig {
            template: "{{#each services}}{{this.name}}\n{{/each}}".into(),
            destination: destination.clone(),
            ..TemplateRouterConfig::default()
        };
        let router = TemplateRouter::new(config);

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
        let batch = vec![ServiceReport { service, reports: vec![report] }];

        router.update(&batch).await.unwrap();
        let written = tokio::fs::read_to_string(&destination).await.unwrap();
        assert_eq!(written, "web\n");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
