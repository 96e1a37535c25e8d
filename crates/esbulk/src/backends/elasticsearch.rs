//! 📡 The Elasticsearch backend: who we talk to, how we say hello, and where the bulk
//! bodies go.
//!
//! 🧠 Knowledge graph:
//! - `transport` owns the HTTP client, the node list and the per-request retry policy.
//! - `discovery` holds the wire models for `GET /` and `GET /_nodes/http`.
//! - `elasticsearch_sink` is the Sink: probe once at startup, then one `_bulk` POST per batch.

mod discovery;
mod elasticsearch_sink;
mod transport;

use serde::{Deserialize, Serialize};

pub use discovery::{ServerInfo, ServerVersion};
pub(crate) use elasticsearch_sink::ElasticsearchSink;
pub use transport::TransportConfig;

/// 🔒 Credentials for the cluster. All optional, because localhost clusters trust everybody.
///
/// ⚠️ If both are set, the API key wins. This is not a democracy.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ElasticsearchConfig {
    /// 🔒 Username. The bouncer at the club. Except the club is a database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// 🔒 Password. "password123" is not a password. It is a confession.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// 🔒 API key, the velvet rope variant of authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}
