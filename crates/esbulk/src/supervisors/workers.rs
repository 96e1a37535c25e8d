//! 🧵 Workers: the ones who actually do the work while the Supervisor takes all the
//! credit in the sprint retro.
//!
//! 🧠 Knowledge graph:
//! ```text
//! SourceWorker (blocking thread) ──bounded channel──▶ Batcher ──▶ SinkWorker (async task)
//!      parse → Operation                      bulk_size chunks      encode → Sink::send
//! ```
//! - The channel is the only thing the two sides share (plus an atomic byte counter
//!   for the progress bar).
//! - The SinkWorker owns the Batcher, and the Batcher owns the SourceWorker's handle,
//!   so the parser's verdict is always heard before the last batch goes out.
//!
//! ⚠️ "If you're reading this, the code review went poorly."

use anyhow::Result;
use tokio::task::JoinHandle;

mod batcher;
mod sink_worker;
mod source_worker;

pub(crate) use batcher::Batcher;
pub(crate) use sink_worker::SinkWorker;
pub(crate) use source_worker::SourceWorker;

/// 🏗️ A background worker, that does work. duh.
///
/// "What's the DEAL with lifetime annotations? You borrow something,
///  you give it back. It's not that hard, Jerry!"
pub(crate) trait Worker {
    /// 🎁 What the worker hands back when it's done.
    type Output;

    /// 🚀 Start the worker. Returns a JoinHandle because we trust but verify.
    /// Mostly verify.
    fn start(self) -> JoinHandle<Result<Self::Output>>;
}
