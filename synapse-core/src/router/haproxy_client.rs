//! Low-level HAProxy integration: config rendering, file write,
//! graceful reload, and the stats-socket command/response dance.
//!
//! The three server-line regexes and the `stats socket` discovery
//! regex match HAProxy's own stats-socket command grammar.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use crate::error::{CoreError, CoreResult};

/// The sections of a rendered HAProxy configuration file, keyed the
/// same way the template needs them. `BTreeMap` rather than a hash map
/// so re-renders of an unchanged input are byte-identical.
#[derive(Clone, Debug, Default)]
pub struct HaProxyConfig {
    pub global: Vec<String>,
    pub defaults: Vec<String>,
    pub listen: BTreeMap<String, Vec<String>>,
    pub frontend: BTreeMap<String, Vec<String>>,
    pub backend: BTreeMap<String, Vec<String>>,
}

fn render_section(name: &str, lines: &[String], out: &mut String) {
    out.push_str(name);
    out.push('\n');
    for line in lines {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
}

fn render_named_sections(prefix: &str, sections: &BTreeMap<String, Vec<String>>, out: &mut String) {
    for (key, lines) in sections {
        out.push('\n');
        render_section(&format!("{prefix} {key}"), lines, out);
    }
}

impl HaProxyConfig {
    /// Render the full configuration file text: `global`, `defaults`,
    /// then `listen`, `frontend`, `backend` sections in that order,
    /// each body line indented by two spaces.
    pub fn render(&self) -> String {
        let mut out = String::from("# Handled by synapse. Do not modify it.\n");
        render_section("global", &self.global, &mut out);
        out.push('\n');
        render_section("defaults", &self.defaults, &mut out);
        render_named_sections("listen", &self.listen, &mut out);
        render_named_sections("frontend", &self.frontend, &mut out);
        render_named_sections("backend", &self.backend, &mut out);
        out
    }
}

/// Configuration needed to talk to one HAProxy instance.
pub struct HaProxyClientConfig {
    pub config_path: PathBuf,
    pub reload_command: Vec<String>,
    pub reload_min_interval: Duration,
    pub reload_timeout: Duration,
    pub cleanup_command: Option<Vec<String>>,
    pub cleanup_timeout: Duration,
}

impl Default for HaProxyClientConfig {
    fn default() -> Self {
        HaProxyClientConfig {
            config_path: PathBuf::new(),
            reload_command: Vec::new(),
            reload_min_interval: Duration::from_millis(500),
            reload_timeout: Duration::from_millis(1000),
            cleanup_command: None,
            cleanup_timeout: Duration::from_millis(35_000),
        }
    }
}

/// Drives the actual file, reload-command, and stats-socket mechanics
/// for one HAProxy instance. Holds no knowledge of services; the
/// [`super::haproxy::HaproxyRouter`] above it owns the per-service
/// decision logic and hands this client a complete [`HaProxyConfig`].
pub struct HaProxyClient {
    config: SyncMutex<HaProxyConfig>,
    settings: HaProxyClientConfig,
    socket_path: Option<String>,
    weight_regex: Regex,
    enabled_regex: Regex,
    disabled_regex: Regex,
    reload_mutex: AsyncMutex<()>,
    last_reload: SyncMutex<Option<Instant>>,
}

impl HaProxyClient {
    /// Build a client, discovering the stats socket path by scanning
    /// `global` for a `stats socket <path>` directive. Absence of a
    /// socket is not an error: socket updates are simply disabled and
    /// every change falls through to reload.
    pub fn new(settings: HaProxyClientConfig, initial: HaProxyConfig) -> HaProxyClient {
        let socket_path = find_socket_path(&initial.global);
        if socket_path.is_none() {
            tracing::warn!("no stats socket configured; haproxy will update by reload only");
        }

        HaProxyClient {
            config: SyncMutex::new(initial),
            settings,
            socket_path,
            weight_regex: Regex::new(r"server[\s]+([\S]+).*weight[\s]+([\d]+)").expect("static regex"),
            enabled_regex: Regex::new(r"server\s+(\S+)\s+(\d+\.\d+\.\d+\.\d+):(\d+).*enabled\s?")
                .expect("static regex"),
            disabled_regex: Regex::new(r"server[\s]+([\S]+).*disabled[\s]?").expect("static regex"),
            reload_mutex: AsyncMutex::new(()),
            last_reload: SyncMutex::new(None),
        }
    }

    /// Replace one service's `frontend`/`backend` sections, keyed by
    /// its backend name. Other services' sections are left untouched,
    /// so a debounce batch that only covers a subset of services never
    /// drops the rest of the rendered configuration.
    pub fn upsert_service_sections(&self, backend_name: String, frontend: Vec<String>, backend: Vec<String>) {
        let mut config = self.config.lock();
        config.frontend.insert(backend_name.clone(), frontend);
        config.backend.insert(backend_name, backend);
    }

    pub fn has_socket(&self) -> bool {
        self.socket_path.is_some()
    }

    /// Render and atomically write the configuration file, then run
    /// the reload command (respecting the minimum inter-reload
    /// interval), and finally kick off the cleanup command if one is
    /// configured. Serialised across all callers by `reload_mutex` so
    /// the file-then-exec ordering and interval contract both hold.
    pub async fn reload(&self) -> CoreResult<()> {
        let _guard = self.reload_mutex.lock().await;

        self.write_config().await?;

        tracing::info!(path = %self.settings.config_path.display(), "reloading haproxy");

        if let Some(last) = *self.last_reload.lock() {
            let earliest = last + self.settings.reload_min_interval;
            let now = Instant::now();
            if earliest > now {
                tokio::time::sleep(earliest - now).await;
            }
        }

        let result = run_with_env_and_timeout(
            &self.settings.reload_command,
            &self.settings.config_path,
            self.settings.reload_timeout,
        )
        .await;

        *self.last_reload.lock() = Some(Instant::now());
        result.map_err(|e| CoreError::Reload(e.to_string()))?;

        if let Some(cleanup) = self.settings.cleanup_command.clone() {
            let config_path = self.settings.config_path.clone();
            let timeout = self.settings.cleanup_timeout;
            tokio::spawn(async move {
                if let Err(err) = run_with_env_and_timeout(&cleanup, &config_path, timeout).await {
                    tracing::warn!(error = %err, "cleanup command failed");
                }
            });
        }

        Ok(())
    }

    /// Send `set server` commands for every backend/server whose
    /// rendered line carries a weight, enabled, or disabled marker. Not
    /// serialised with [`Self::reload`]: the pipeline is single
    /// consumer so the two never interleave in practice.
    pub async fn socket_update(&self) -> CoreResult<()> {
        let socket_path = self
            .socket_path
            .as_ref()
            .ok_or_else(|| CoreError::Socket("no stats socket configured".into()))?;

        if let Err(err) = self.write_config().await {
            tracing::warn!(error = %err, "failed to write configuration file during socket update");
        }

        let backends = self.config.lock().backend.clone();
        for (name, servers) in backends {
            for server in servers {
                let mut commands = Vec::new();

                if let Some(caps) = self.weight_regex.captures(&server) {
                    commands.push(format!("set server {name}/{} weight {}", &caps[1], &caps[2]));
                }
                if let Some(caps) = self.enabled_regex.captures(&server) {
                    commands.push(format!("set server {name}/{} state ready", &caps[1]));
                    commands.push(format!(
                        "set server {name}/{} addr {} {}",
                        &caps[1], &caps[2], &caps[3]
                    ));
                }
                if let Some(caps) = self.disabled_regex.captures(&server) {
                    commands.push(format!("set server {name}/{} state maint", &caps[1]));
                }

                for command in commands {
                    let response = run_socket_command(socket_path, &command).await?;
                    validate_socket_response(&command, &response)?;
                }
            }
        }

        tracing::debug!("successfully updated haproxy by socket");
        Ok(())
    }

    async fn write_config(&self) -> CoreResult<()> {
        let rendered = self.config.lock().render();
        let path = &self.settings.config_path;
        let tmp_path = path.with_extension("tmp");

        tokio::fs::write(&tmp_path, rendered.as_bytes())
            .await
            .map_err(|e| CoreError::Io { path: tmp_path.display().to_string(), source: e })?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| CoreError::Io { path: path.display().to_string(), source: e })?;
        Ok(())
    }
}

fn find_socket_path(global: &[String]) -> Option<String> {
    let socket_regex = Regex::new(r"stats[\s]+socket[\s]+(\S+)").expect("static regex");
    global
        .iter()
        .find_map(|line| socket_regex.captures(line).map(|caps| caps[1].to_string()))
}

async fn run_with_env_and_timeout(
    argv: &[String],
    config_path: &std::path::Path,
    timeout: Duration,
) -> anyhow::Result<()> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("empty command"))?;

    let mut command = tokio::process::Command::new(program);
    command
        .args(args)
        .env("HAP_CONFIG", config_path)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let status = tokio::time::timeout(timeout, command.status())
        .await
        .map_err(|_| anyhow::anyhow!("command timed out after {timeout:?}"))??;

    if !status.success() {
        anyhow::bail!("command exited with {status}");
    }
    Ok(())
}

async fn run_socket_command(socket_path: &str, command: &str) -> CoreResult<String> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| CoreError::Socket(format!("connecting to {socket_path}: {e}")))?;

    stream
        .write_all(format!("{command}\n").as_bytes())
        .await
        .map_err(|e| CoreError::Socket(format!("writing command {command:?}: {e}")))?;

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .map_err(|e| CoreError::Socket(format!("reading response to {command:?}: {e}")))?;

    Ok(response)
}

fn validate_socket_response(command: &str, response: &str) -> CoreResult<()> {
    for line in response.split('\n') {
        if line.is_empty() || line.starts_with("no need to change") || line.starts_with("IP changed from") {
            continue;
        }
        return Err(CoreError::Socket(format!(
            "bad response for command {command:?}: {response:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_socket_path() {
        let global = vec!["maxconn 4096".to_string(), "stats socket /var/run/haproxy.sock".to_string()];
        assert_eq!(find_socket_path(&global), Some("/var/run/haproxy.sock".to_string()));
    }

    #[test]
    fn missing_socket_directive_returns_none() {
        let global = vec!["maxconn 4096".to_string()];
        assert_eq!(find_socket_path(&global), None);
    }

    #[test]
    fn renders_sections_in_order_with_two_space_indent() {
        let mut config = HaProxyConfig::default();
        config.global.push("maxconn 4096".into());
        config.defaults.push("mode http".into());
        config.backend.insert("web_1".into(), vec!["server a 10.0.0.1:8080".into()]);

        let rendered = config.render();
        let global_idx = rendered.find("global").unwrap();
        let defaults_idx = rendered.find("defaults").unwrap();
        let backend_idx = rendered.find("backend web_1").unwrap();
        assert!(global_idx < defaults_idx);
        assert!(defaults_idx < backend_idx);
        assert!(rendered.contains("  maxconn 4096"));
        assert!(rendered.contains("  server a 10.0.0.1:8080"));
    }

    #[test]
    fn validates_acceptable_socket_responses() {
        assert!(validate_socket_response("cmd", "").is_ok());
        assert!(validate_socket_response("cmd", "no need to change\n").is_ok());
        assert!(validate_socket_response("cmd", "IP changed from 1.2.3.4 to 5.6.7.8\n").is_ok());
        assert!(validate_socket_response("cmd", "unknown command\n").is_err());
    }

    #[test]
    fn extracts_weight_command() {
        let regex = Regex::new(r"server[\s]+([\S]+).*weight[\s]+([\d]+)").unwrap();
        let caps = regex.captures("server a 10.0.0.1:8080 weight 10 enabled").unwrap();
        assert_eq!(&caps[1], "a");
        assert_eq!(&caps[2], "10");
    }
}
