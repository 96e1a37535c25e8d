//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment. Layers, lowest precedence first:
//!   1. serde defaults on the structs below
//!   2. an optional TOML file
//!   3. `ESBULK_*` environment variables (`__` nests, e.g. `ESBULK_TRANSPORT__MAX_RETRIES`)
//!   4. whatever the CLI passed in `ConfigOverrides`
//!
//! Then `validate()` runs once, and the resulting `AppConfig` is immutable for the
//! rest of the run. No globals. The flags grew up and moved into a struct.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backends::elasticsearch::{ElasticsearchConfig, TransportConfig};
use crate::error::LoadError;

/// 🚫 The "-" sentinel. As an id field it means "create only"; as an index field it
/// means "no per-document routing"; as a data source it means stdin.
pub const SENTINEL: &str = "-";

// -- 🚫 characters the engine refuses in index names; `?` and `#` would also bend the URL
const FORBIDDEN_IN_INDEX: [char; 12] = ['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#', ' ', ':'];

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// 📡 Base URL of one node of the cluster. Discovery finds the rest.
    #[serde(default = "default_es_address")]
    pub es_address: String,
    /// 📦 Operations per bulk request. Must be positive.
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,
    /// 🪪 Field to pull the document id from, or "-" for create operations.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// 🎯 Index every batch is written into.
    #[serde(default = "default_index_name")]
    pub index_name: String,
    /// 📂 File to read documents from, or "-" for stdin.
    #[serde(default = "default_sentinel")]
    pub data_source: String,
    /// 🧭 Field to pull a per-document `_index` from, or "-" to send everything to `index_name`.
    #[serde(default = "default_sentinel")]
    pub index_field: String,
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_es_address() -> String {
    "http://localhost:9200".to_string()
}

fn default_bulk_size() -> usize {
    1000
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_index_name() -> String {
    "index".to_string()
}

fn default_sentinel() -> String {
    SENTINEL.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            es_address: default_es_address(),
            bulk_size: default_bulk_size(),
            id_field: default_id_field(),
            index_name: default_index_name(),
            data_source: default_sentinel(),
            index_field: default_sentinel(),
            elasticsearch: ElasticsearchConfig::default(),
            transport: TransportConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// 🧵 How the pipeline itself behaves, as opposed to where it points.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RuntimeConfig {
    /// ✉️ Slots in the parser → batcher hand-off. Small on purpose: the parser should
    /// wait for the batcher, not race ahead of it. Must be at least 1.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// 📊 Draw the progress bar on stderr.
    #[serde(default = "default_progress")]
    pub progress: bool,
}

fn default_queue_capacity() -> usize {
    1
}

fn default_progress() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            progress: default_progress(),
        }
    }
}

impl AppConfig {
    /// 🪪 The id field, unless the sentinel switched id-based indexing off.
    pub fn id_field(&self) -> Option<&str> {
        enabled(&self.id_field)
    }

    /// 🧭 The per-document index field, unless disabled.
    pub fn index_field(&self) -> Option<&str> {
        enabled(&self.index_field)
    }

    /// ✅ Reject impossible settings before anything touches the network or the input.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.bulk_size == 0 {
            return Err(LoadError::Config(
                "bulk_size must be a positive integer".to_string(),
            ));
        }
        if self.runtime.queue_capacity == 0 {
            return Err(LoadError::Config(
                "runtime.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.id_field.is_empty() {
            return Err(LoadError::Config(format!(
                "id_field must name a field, or be \"{SENTINEL}\" for create operations"
            )));
        }
        if self.index_field.is_empty() {
            return Err(LoadError::Config(format!(
                "index_field must name a field, or be \"{SENTINEL}\" to disable it"
            )));
        }
        if self.index_name.is_empty() {
            return Err(LoadError::Config("index_name must not be empty".to_string()));
        }
        // -- 🚧 the name lands in the URL path, so `?` or `#` would quietly aim at another endpoint
        if let Some(bad) = self.index_name.chars().find(|c| FORBIDDEN_IN_INDEX.contains(c)) {
            return Err(LoadError::Config(format!(
                "index_name {:?} contains {bad:?}, which no index name may contain",
                self.index_name
            )));
        }
        if self.index_name.starts_with(['_', '-', '+'])
            || matches!(self.index_name.as_str(), "." | "..")
        {
            return Err(LoadError::Config(format!(
                "index_name {:?} may not start with '_', '-' or '+', nor be '.' or '..'",
                self.index_name
            )));
        }
        if self.data_source.is_empty() {
            return Err(LoadError::Config(format!(
                "data_source must be a file path or \"{SENTINEL}\" for stdin"
            )));
        }
        let url = reqwest::Url::parse(&self.es_address).map_err(|err| {
            LoadError::Config(format!("es_address {:?} is not a URL: {err}", self.es_address))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(LoadError::Config(format!(
                "es_address {:?} must be http or https",
                self.es_address
            )));
        }
        self.transport.validate()
    }
}

fn enabled(field: &str) -> Option<&str> {
    if field == SENTINEL { None } else { Some(field) }
}

/// 🎛️ Values the command line wants to force on top of file and environment.
/// Every `None` leaves the lower layers alone.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub es_address: Option<String>,
    pub bulk_size: Option<usize>,
    pub id_field: Option<String>,
    pub index_name: Option<String>,
    pub data_source: Option<String>,
    pub index_field: Option<String>,
    pub discover_nodes: Option<bool>,
    pub progress: Option<bool>,
}

impl ConfigOverrides {
    fn layer_onto(&self, mut figment: Figment) -> Figment {
        // -- 🎯 dotted keys nest, so "transport.discover_nodes" lands inside [transport]
        fn set<T: Serialize>(figment: Figment, key: &str, value: &Option<T>) -> Figment {
            match value {
                Some(value) => figment.merge(Serialized::default(key, value)),
                None => figment,
            }
        }
        figment = set(figment, "es_address", &self.es_address);
        figment = set(figment, "bulk_size", &self.bulk_size);
        figment = set(figment, "id_field", &self.id_field);
        figment = set(figment, "index_name", &self.index_name);
        figment = set(figment, "data_source", &self.data_source);
        figment = set(figment, "index_field", &self.index_field);
        figment = set(figment, "transport.discover_nodes", &self.discover_nodes);
        set(figment, "runtime.progress", &self.progress)
    }
}

/// 🚀 Load the config from defaults, an optional TOML file, `ESBULK_*` env vars and the
/// CLI overrides, then validate it.
///
/// 📐 `config_file_name == None` → no file layer at all. We don't go hunting for a
/// default file name; nobody asked us to.
///
/// 💀 Errors carry a context that says which layers were involved. A bad value ends up
/// as a `LoadError::Config` at the root of the chain.
pub fn load_config(
    config_file_name: Option<&Path>,
    overrides: &ConfigOverrides,
) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let figment = Figment::new();
    let figment = match config_file_name {
        Some(file_name) => figment.merge(Toml::file(file_name)),
        None => figment,
    };
    let figment = figment.merge(Env::prefixed("ESBULK_").split("__"));
    let figment = overrides.layer_onto(figment);

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}', ESBULK_* environment variables and flags. \
             The file exists in our hearts, but maybe not on disk.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from ESBULK_* environment variables and flags. \
                 No file was provided, so this one's all on the environment. Classic."
            .to_string(),
    };

    let app_config: AppConfig = figment
        .extract()
        .map_err(|err| LoadError::Config(err.to_string()))
        .context(context_msg)?;
    app_config
        .validate()
        .context("💀 The configuration parsed, but it asks for something impossible")?;
    Ok(app_config)
}
