//! 🩺 What the cluster tells us when we knock: its name, its version, and where its
//! other nodes live.

use std::collections::BTreeMap;

use serde::Deserialize;

/// 🏷️ The interesting bits of `GET /`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerInfo {
    #[serde(rename = "name", default)]
    pub hostname: String,
    #[serde(rename = "cluster_name", default)]
    pub cluster_name: String,
    #[serde(default)]
    pub version: ServerVersion,
}

/// 🏷️ `version` inside `GET /`. Only the number survives the trip.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServerVersion {
    #[serde(default)]
    pub number: String,
}

/// 🧭 `GET /_nodes/http`. The node ids are keys; we only care about the values.
#[derive(Debug, Deserialize)]
pub(crate) struct NodesResponse {
    #[serde(default)]
    nodes: BTreeMap<String, NodeInfo>,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    #[serde(default)]
    roles: Vec<String>,
    http: Option<NodeHttp>,
}

#[derive(Debug, Deserialize)]
struct NodeHttp {
    publish_address: String,
}

impl NodesResponse {
    /// 🔗 Node base URLs, built with the seed's scheme. Dedicated masters are left out
    /// since they don't want our bulk traffic, and neither would you.
    pub(crate) fn node_urls(&self, scheme: &str) -> Vec<String> {
        self.nodes
            .values()
            .filter(|node| !(node.roles.len() == 1 && node.roles[0] == "master"))
            .filter_map(|node| node.http.as_ref())
            .map(|http| format!("{}://{}", scheme, host_port(&http.publish_address)))
            .collect()
    }
}

/// ✂️ `hostname/10.0.0.1:9200` → `hostname:9200`; a bare `10.0.0.1:9200` stays as it is.
fn host_port(publish_address: &str) -> String {
    match publish_address.split_once('/') {
        Some((host, address)) => match address.rsplit_once(':') {
            Some((_, port)) => format!("{host}:{port}"),
            None => host.to_string(),
        },
        None => publish_address.to_string(),
    }
}
