//! 🚚 The transport: one pooled HTTP client, a list of nodes, and a retry policy that is
//! configured once and then left alone.
//!
//! 🧠 Knowledge graph:
//! - Requests rotate round-robin over the known nodes (the seed, until discovery says more).
//! - A single *request* may be retried on another node when the connection fails, when
//!   the response headers take longer than `response_header_timeout_ms` (if
//!   `retry_on_timeout`), or when a node answers 502/503/504. That's the whole policy.
//! - There is no *batch*-level retry anywhere. If every attempt fails, the transport
//!   returns `LoadError::Transport` and the run is over.
//! - `reqwest::Client::send()` resolves as soon as the headers arrive, so wrapping it in
//!   `tokio::time::timeout` gives us a response-header timeout without extra machinery.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::ElasticsearchConfig;
use crate::error::LoadError;

/// 🔧 Knobs for the HTTP layer. Set at startup, shared by every request of the run.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransportConfig {
    /// 🏊 Idle keep-alive connections kept per host.
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
    /// 🔌 How long to wait for the TCP (and TLS) handshake.
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// ⏱️ How long to wait for response headers on one attempt.
    #[serde(default = "default_timeout_ms")]
    pub response_header_timeout_ms: u64,
    /// 🔄 Whether a header timeout counts as retryable.
    #[serde(default = "default_true")]
    pub retry_on_timeout: bool,
    /// 🔄 Extra attempts per request after the first one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 🧭 Ask the seed node for the rest of the cluster before loading.
    #[serde(default = "default_true")]
    pub discover_nodes: bool,
}

fn default_max_idle_per_host() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: default_max_idle_per_host(),
            connect_timeout_ms: default_timeout_ms(),
            response_header_timeout_ms: default_timeout_ms(),
            retry_on_timeout: default_true(),
            max_retries: default_max_retries(),
            discover_nodes: default_true(),
        }
    }
}

impl TransportConfig {
    pub(crate) fn validate(&self) -> Result<(), LoadError> {
        if self.connect_timeout_ms == 0 || self.response_header_timeout_ms == 0 {
            return Err(LoadError::Config(
                "transport timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// -- 🩹 gateway-ish statuses: the node we hit is having a moment, another one might not be
const RETRY_ON_STATUS: [StatusCode; 3] = [
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// 📡 The HTTP muscle, reused across every request of the run.
#[derive(Debug)]
pub(crate) struct Transport {
    client: reqwest::Client,
    nodes: Vec<String>,
    next_node: usize,
    auth: ElasticsearchConfig,
    config: TransportConfig,
}

impl Transport {
    pub(crate) fn new(
        seed: &str,
        auth: ElasticsearchConfig,
        config: TransportConfig,
    ) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|err| LoadError::Config(format!("could not build the HTTP client: {err}")))?;
        Ok(Self {
            client,
            nodes: vec![seed.trim_end_matches('/').to_string()],
            next_node: 0,
            auth,
            config,
        })
    }

    pub(crate) fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// 🧭 Replace the node list. An empty list keeps the one we have.
    pub(crate) fn set_nodes(&mut self, nodes: Vec<String>) {
        if nodes.is_empty() {
            return;
        }
        self.nodes = nodes
            .into_iter()
            .map(|node| node.trim_end_matches('/').to_string())
            .collect();
        self.next_node = 0;
    }

    fn pick_node(&mut self) -> String {
        let node = self.nodes[self.next_node % self.nodes.len()].clone();
        self.next_node = (self.next_node + 1) % self.nodes.len();
        node
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        // -- 🔒 API key beats basic auth in this club
        if let Some(ref api_key) = self.auth.api_key {
            request.header("Authorization", format!("ApiKey {}", api_key))
        } else if let Some(ref username) = self.auth.username {
            request.basic_auth(username, self.auth.password.as_ref())
        } else {
            request
        }
    }

    /// 📡 Perform one logical request, with the transport-level retries described up top.
    ///
    /// A response is returned whatever its status (after the 502/503/504 retries ran out);
    /// deciding whether a status is acceptable is the caller's business.
    pub(crate) async fn perform(
        &mut self,
        method: Method,
        path: &str,
        body: Option<(&'static str, Vec<u8>)>,
    ) -> Result<Response, LoadError> {
        let header_timeout = Duration::from_millis(self.config.response_header_timeout_ms);
        let attempts = self.config.max_retries + 1;
        let mut last_failure = (String::new(), String::new());

        for attempt in 1..=attempts {
            let node = self.pick_node();
            let url = format!("{}/{}", node, path.trim_start_matches('/'));
            let mut request = self.authorize(self.client.request(method.clone(), &url));
            if let Some((content_type, bytes)) = &body {
                request = request.header("Content-Type", *content_type).body(bytes.clone());
            }
            trace!("📡 {} {} (attempt {}/{})", method, url, attempt, attempts);

            let failure = match tokio::time::timeout(header_timeout, request.send()).await {
                Ok(Ok(response)) => {
                    let status = response.status();
                    if RETRY_ON_STATUS.contains(&status) && attempt < attempts {
                        warn!("🩹 {} answered {}, trying the next node", node, status);
                        last_failure = (node, format!("HTTP {status}"));
                        continue;
                    }
                    return Ok(response);
                }
                Ok(Err(err)) => {
                    let reason = describe(&err);
                    // -- 🧱 a request we couldn't even build will fail the same way on every node
                    if err.is_builder() {
                        return Err(LoadError::Transport { node, reason });
                    }
                    (node, reason, true)
                }
                Err(_) => (
                    node,
                    format!("no response headers within {header_timeout:?}"),
                    self.config.retry_on_timeout,
                ),
            };

            let (node, reason, retryable) = failure;
            if !retryable || attempt == attempts {
                return Err(LoadError::Transport { node, reason });
            }
            warn!(
                "🔄 attempt {}/{} against {} failed: {}. Trying again.",
                attempt, attempts, node, reason
            );
            last_failure = (node, reason);
        }

        let (node, reason) = last_failure;
        Err(LoadError::Transport { node, reason })
    }
}

/// 🧅 reqwest hides the interesting part ("connection refused") a few sources down.
fn describe(err: &reqwest::Error) -> String {
    let mut reason = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    reason
}
