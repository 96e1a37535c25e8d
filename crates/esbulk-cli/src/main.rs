//! 🚀 esbulk-cli: the front door, the bouncer, the maitre d' of esbulk.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary parses flags, sets up logging, loads the config, and lets the library
//! do the heavy lifting. It is also the only place where an error turns into an exit
//! code. Like a manager. 🦆

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use esbulk::{ConfigOverrides, LoadError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 🚚 Load concatenated JSON documents into Elasticsearch through the bulk API.
///
/// Every flag also has a config-file key and an `ESBULK_*` environment variable.
/// Flags win.
#[derive(Parser, Debug)]
#[command(name = "esbulk", version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Base URL of one cluster node
    #[arg(long, alias = "esAddress", value_name = "URL")]
    es_address: Option<String>,
    /// Operations per bulk request
    #[arg(long, alias = "bulkSize", value_name = "COUNT")]
    bulk_size: Option<usize>,
    /// Field holding the document id, or "-" to let the engine pick ids
    #[arg(long, alias = "idField", value_name = "FIELD")]
    id_field: Option<String>,
    /// Index to write into
    #[arg(long, alias = "indexName", value_name = "INDEX")]
    index_name: Option<String>,
    /// File to read documents from, or "-" for stdin
    #[arg(long, alias = "dataSource", value_name = "PATH")]
    data_source: Option<String>,
    /// Field holding a per-document target index, or "-" to disable
    #[arg(long, alias = "indexField", value_name = "FIELD")]
    index_field: Option<String>,
    /// Skip node discovery and send everything to the seed address
    #[arg(long, action = ArgAction::SetTrue)]
    no_discover: bool,
    /// Don't draw the progress bar
    #[arg(long, action = ArgAction::SetTrue)]
    no_progress: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            es_address: self.es_address.clone(),
            bulk_size: self.bulk_size,
            id_field: self.id_field.clone(),
            index_name: self.index_name.clone(),
            data_source: self.data_source.clone(),
            index_field: self.index_field.clone(),
            // -- 🎛️ a switch that's off means "no opinion", not "false"
            discover_nodes: self.no_discover.then_some(false),
            progress: self.no_progress.then_some(false),
        }
    }
}

/// 🚀 main(): the "I pressed F5 and held my breath" moment.
///
/// 🔧 Steps:
/// 1. Init tracing (stderr, `RUST_LOG`, `info` when unset)
/// 2. Parse args
/// 3. Load config
/// 4. Run the thing (send it and pray 🙏)
/// 5. Handle errors (cry, then exit 1)
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(err) = load_and_run(&args).await {
        report(&err);
        // 🗑️ Exit with prejudice. Process exitus maximus.
        std::process::exit(1);
    }
    Ok(())
}

async fn load_and_run(args: &Args) -> Result<()> {
    // 🔒 a config file that was asked for by name has to exist, figment would shrug silently
    if let Some(path) = &args.config {
        let exists = path.try_exists().context(format!(
            "💀 Couldn't even check whether '{}' exists. Permissions, maybe?",
            path.display()
        ))?;
        if !exists {
            return Err(LoadError::Config(format!(
                "configuration file '{}' does not exist",
                path.display()
            )))
            .context(
                "💀 Configuration file not found. Double check the path, or if it's relative, \
                 double check where you're standing.",
            );
        }
    }

    let app_config = esbulk::load_config(args.config.as_deref(), &args.overrides())
        .context("💀 In esbulk-cli, we couldn't load the configuration. Take a look at the file, the ESBULK_* variables and the flags.")?;

    let summary = esbulk::run(app_config).await?;
    info!(
        "✅ Loaded {} documents in {} bulk requests. Pop the champagne. 🍾",
        summary.operations, summary.batches
    );
    Ok(())
}

/// 💀 Say what went wrong, in a way that's helpful at 3am.
fn report(err: &anyhow::Error) {
    // -- 📜 a rejected bulk gets the engine's own words on stderr, verbatim, no makeup
    if let Some(LoadError::BulkRejected { status, body }) = err.downcast_ref::<LoadError>() {
        if let Err(io_err) = write_rejection_body(&mut std::io::stderr().lock(), body) {
            error!("💀 couldn't even print the rejection body: {}", io_err);
        }
        error!("💀 bulk request rejected with HTTP {}: {}", status, err);
        return;
    }

    error!("💀 error: {}", err);
    // -- 🧅 peel the onion of sadness, one layer at a time
    let mut the_vibes_are_giving_connection_issues = false;
    for cause in err.chain().skip(1) {
        error!("⚠️  cause: {}", cause);
        let cause_str = cause.to_string();
        if cause_str.contains("error sending request")
            || cause_str.contains("onnection refused")
            || cause_str.contains("tcp connect error")
            || cause_str.contains("dns error")
            || cause_str.contains("no response headers within")
        {
            the_vibes_are_giving_connection_issues = true;
        }
    }
    if the_vibes_are_giving_connection_issues {
        error!(
            "🔧 hint: looks like Elasticsearch isn't reachable. Check that it's running and that \
             --es-address points at it. If you're using Docker, `docker ps` is your friend. ☕"
        );
    }
}

/// 📜 The engine's answer to a rejected bulk, byte for byte, then one newline so the
/// next log line starts clean.
fn write_rejection_body(out: &mut impl Write, body: &[u8]) -> std::io::Result<()> {
    out.write_all(body)?;
    out.write_all(b"\n")?;
    out.flush()
}
