//! Decodes a registry node's JSON payload into a [`Report`].
//!
//! All fields are optional except `host`/`port`; an absent `name`
//! falls back to the znode's own name (the last path segment), since
//! the registry is free to omit it when the path already identifies
//! the server uniquely.

use std::collections::HashMap;

use serde::Deserialize;
use synapse_core::Report;

#[derive(Deserialize)]
struct RawReport {
    #[serde(default)]
    name: Option<String>,
    host: String,
    port: u16,
    #[serde(default)]
    available: Option<bool>,
    #[serde(default)]
    weight: Option<u32>,
    #[serde(default)]
    haproxy_server_options: Option<String>,
    #[serde(default)]
    unavailable_reason: Option<String>,
    #[serde(default)]
    labels: HashMap<String, String>,
}

/// Decode one znode's payload. `node_name` is the last path segment,
/// used as the `name` fallback; `creation_time` is the znode's own
/// `Stat::ctime`, carried through purely for `server_sort: date`.
pub fn decode_report(node_name: &str, data: &[u8], creation_time: i64) -> serde_json::Result<Report> {
    let raw: RawReport = serde_json::from_slice(data)?;
    Ok(Report {
        name: raw.name.unwrap_or_else(|| node_name.to_string()),
        host: raw.host,
        port: raw.port,
        available: raw.available,
        weight: raw.weight,
        haproxy_server_options: raw.haproxy_server_options,
        labels: raw.labels,
        unavailable_reason: raw.unavailable_reason,
        creation_time,
    })
}
