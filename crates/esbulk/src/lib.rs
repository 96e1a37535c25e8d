//! 🚚 esbulk: stream concatenated JSON documents into an Elasticsearch-compatible engine
//! through its `_bulk` API, one fixed-size batch at a time.
//!
//! 🧠 Knowledge graph:
//! - `app_config` loads and validates the run configuration (figment layers).
//! - `parser` turns bytes into `Operation`s on a blocking thread.
//! - `supervisors` wires parser → channel → batcher → `composers` → `backends` and runs
//!   the `Init → Probing → Streaming → Done` show.
//! - `error::LoadError` sits at the root of every fatal `anyhow` chain.

use std::io::Read;

use anyhow::Result;

pub mod app_config;
pub mod common;
pub mod error;

mod backends;
mod composers;
mod parser;
mod progress;
mod supervisors;

pub use app_config::{AppConfig, ConfigOverrides, load_config};
pub use backends::elasticsearch::{
    ElasticsearchConfig, ServerInfo, ServerVersion, TransportConfig,
};
pub use common::RunSummary;
pub use error::LoadError;
pub use parser::ParseReport;

use crate::backends::source::OpenedInput;
use crate::supervisors::Supervisor;

/// 🚀 Probe the cluster, open `data_source`, and load everything in it.
pub async fn run(app_config: AppConfig) -> Result<RunSummary> {
    Supervisor::new(app_config)?.run().await
}

/// 🚀 Same as [`run`], but the documents come from `reader` instead of `data_source`.
pub async fn run_with_reader(
    app_config: AppConfig,
    name: impl Into<String>,
    reader: impl Read + Send + 'static,
) -> Result<RunSummary> {
    Supervisor::new(app_config)?
        .run_with_input(OpenedInput::from_reader(name, reader))
        .await
}
