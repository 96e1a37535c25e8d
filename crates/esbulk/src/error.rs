//! 💀 The fatal taxonomy: every way a load can end badly, with a name tag on each.
//!
//! 🧠 Knowledge graph:
//! - Library code speaks `anyhow::Result` and piles `.context(...)` on top like lasagna.
//! - At the bottom of every fatal chain sits one of these `LoadError`s, so whoever
//!   holds the `anyhow::Error` can `downcast_ref::<LoadError>()` and decide what to do.
//! - The CLI does exactly that to spot `BulkRejected` and dump the engine's body to stderr.
//! - None of these are recoverable. There is no "skip and carry on". A concatenated JSON
//!   stream after a bad token is a haunted house, and we don't do haunted houses. 🦆

use thiserror::Error;

/// 🏷️ Everything that can stop a run. All of them are terminal.
#[derive(Debug, Error)]
pub enum LoadError {
    /// 🔧 The knobs were turned to an impossible position before we even started.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// 📄 The input stopped being JSON somewhere around `offset`.
    #[error("malformed JSON at document #{document} (byte offset {offset}): {source}")]
    Parse {
        document: u64,
        offset: usize,
        #[source]
        source: serde_json::Error,
    },

    /// 🪪 A document showed up without the field we were told to pull its id (or index) from.
    #[error("document #{document} has no non-empty string field {field:?}")]
    MissingField { document: u64, field: String },

    /// 📦 Writing the bulk body itself failed. Rare, alarming, fatal.
    #[error("failed to encode bulk request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// 📡 The engine was unreachable, or answered too slowly, on every attempt we had.
    #[error("transport failure talking to {node}: {reason}")]
    Transport { node: String, reason: String },

    /// 🩺 The startup health check or node discovery did not go to plan.
    #[error("engine probe failed: {0}")]
    Probe(String),

    /// 🚫 The bulk endpoint answered, with a status that was not a yes.
    #[error("bulk request rejected with HTTP {status}")]
    BulkRejected { status: u16, body: Vec<u8> },
}

impl LoadError {
    /// 📛 Short stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Config(_) => "config",
            LoadError::Parse { .. } => "parse",
            LoadError::MissingField { .. } => "missing_field",
            LoadError::Encode(_) => "encode",
            LoadError::Transport { .. } => "transport",
            LoadError::Probe(_) => "probe",
            LoadError::BulkRejected { .. } => "bulk_rejected",
        }
    }
}
