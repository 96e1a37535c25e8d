use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, trace};

use super::discovery::{NodesResponse, ServerInfo};
use super::transport::Transport;
use crate::app_config::AppConfig;
use crate::backends::Sink;
use crate::error::LoadError;

const NDJSON: &str = "application/x-ndjson";

/// 📜 The two fields of a bulk response we bother to read. Per-item results stay unread,
/// the cluster's opinion of each document is between it and the document.
#[derive(Debug, Deserialize)]
struct BulkResponse {
    took: Option<u64>,
    errors: Option<bool>,
}

/// 📡 The sink side of the Elasticsearch backend. Pure I/O, zero buffering.
///
/// Accepts a fully rendered NDJSON body and POSTs it to `/{index}/_bulk`. That's it.
/// The SinkWorker upstream handles batching and encoding. Before any of that, the
/// supervisor calls `probe` once to say hello and learn the rest of the cluster.
///
/// 🚰 Knock knock. Who's there? HTTP POST. HTTP POST who? HTTP POST your NDJSON
/// and hope the cluster's in a good mood.
#[derive(Debug)]
pub(crate) struct ElasticsearchSink {
    transport: Transport,
    /// 🔗 discovered nodes inherit the seed's scheme, the `_nodes` API doesn't tell us one
    scheme: String,
    discover_nodes: bool,
}

impl ElasticsearchSink {
    /// 🚀 Wire up the transport. No network traffic yet, that's `probe`'s job.
    pub(crate) fn new(config: &AppConfig) -> Result<Self> {
        let url = reqwest::Url::parse(&config.es_address)
            .map_err(|err| LoadError::Config(format!("es_address is not a URL: {err}")))
            .context("💀 Could not make sense of the seed address")?;
        let transport = Transport::new(
            &config.es_address,
            config.elasticsearch.clone(),
            config.transport.clone(),
        )
        .context("💀 The HTTP client refused to be born. The TLS stack wept. The architect shrugged.")?;
        Ok(Self {
            transport,
            scheme: url.scheme().to_string(),
            discover_nodes: config.transport.discover_nodes,
        })
    }

    /// 🩺 "Hello? Is this thing on?" Ping `/`, then (unless told not to) ask for the other nodes.
    /// Any failure here is fatal, and it happens before a single byte of input is read.
    pub(crate) async fn probe(&mut self) -> Result<ServerInfo> {
        let response = self
            .transport
            .perform(Method::GET, "/", None)
            .await
            .context("💀 Reached out to the cluster to say hello. Got ghosted.")?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Probe(format!("GET / answered HTTP {status}")))
                .context("💀 The cluster picked up the phone, then said something rude");
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| LoadError::Probe(format!("could not read the GET / body: {err}")))?;
        // -- 🤷 best effort: a cluster that answers 2xx with a weird body is still a cluster
        let server_info = serde_json::from_slice::<ServerInfo>(&body).unwrap_or_else(|err| {
            debug!("🤷 GET / body did not look like server info: {}", err);
            ServerInfo::default()
        });
        info!(
            "🩺 Connected to node '{}' of cluster '{}' (version {})",
            server_info.hostname, server_info.cluster_name, server_info.version.number
        );

        if self.discover_nodes {
            self.discover()
                .await
                .context("💀 Node discovery failed. The seed answered, its friends are a mystery.")?;
        }
        Ok(server_info)
    }

    async fn discover(&mut self) -> Result<()> {
        let response = self
            .transport
            .perform(Method::GET, "/_nodes/http", None)
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Probe(format!("GET /_nodes/http answered HTTP {status}")).into());
        }
        let body = response.bytes().await.map_err(|err| {
            LoadError::Probe(format!("could not read the GET /_nodes/http body: {err}"))
        })?;
        let nodes: NodesResponse = serde_json::from_slice(&body)
            .map_err(|err| LoadError::Probe(format!("unreadable _nodes/http response: {err}")))?;

        let urls = nodes.node_urls(&self.scheme);
        if urls.is_empty() {
            info!("🧭 Discovery found no HTTP nodes, sticking with the seed");
        }
        self.transport.set_nodes(urls);
        info!("🧭 Bulk requests will rotate over {:?}", self.transport.nodes());
        Ok(())
    }
}

#[async_trait]
impl Sink for ElasticsearchSink {
    /// 📡 POST the rendered body to `/{index}/_bulk`. Anything but a 200 is the end of the run,
    /// a 201 or a 202 included: the bulk API only ever answers a finished batch with 200.
    async fn send(&mut self, body: Vec<u8>, index: &str) -> Result<()> {
        let size = body.len();
        trace!("📡 Sending {} bytes to /{}/_bulk, the payload has left the building", size, index);

        let response = self
            .transport
            .perform(Method::POST, &format!("{index}/_bulk"), Some((NDJSON, body)))
            .await
            .context("💀 The bulk request never got a proper answer. Check connectivity. Check your cluster. Check your horoscope.")?;

        let status = response.status();
        let node = response.url().origin().ascii_serialization();
        let response_body = response
            .bytes()
            .await
            .map_err(|err| LoadError::Transport {
                node,
                reason: format!("could not read the bulk response body: {err}"),
            })?;

        if status != StatusCode::OK {
            return Err(LoadError::BulkRejected {
                status: status.as_u16(),
                body: response_body.to_vec(),
            })
            .context(format!(
                "💀 The cluster looked at our {size}-byte bulk request for '{index}' and said no"
            ));
        }

        match serde_json::from_slice::<BulkResponse>(&response_body) {
            Ok(bulk) => debug!(
                "✅ Bulk accepted: took {:?} ms, item errors reported: {:?}",
                bulk.took, bulk.errors
            ),
            Err(_) => debug!("✅ Bulk accepted with HTTP {}", status),
        }
        Ok(())
    }

    /// 🗑️ Nothing to flush, we don't buffer. The connection pool says goodbye on drop. 🦆
    async fn close(&mut self) -> Result<()> {
        debug!("🗑️ Elasticsearch sink closing, no buffer to flush, just vibes to release");
        Ok(())
    }
}
