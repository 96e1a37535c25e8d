use std::io::Read;

use anyhow::{Context, Result};
use async_channel::Sender;
use tokio::task::JoinHandle;
use tracing::debug;

use super::Worker;
use crate::common::Operation;
use crate::parser::{OperationParser, ParseReport};

/// 📥 Runs the parser on a blocking thread and pushes every Operation into the channel.
///
/// `send_blocking` parks the thread while the channel is full, so the parser never
/// reads further ahead of the batcher than the channel allows. When the worker ends,
/// for any reason, the sender is dropped and the channel closes behind it.
pub(crate) struct SourceWorker<R: Read> {
    tx: Sender<Operation>,
    parser: OperationParser<R>,
}

impl<R: Read> SourceWorker<R> {
    pub(crate) fn new(tx: Sender<Operation>, parser: OperationParser<R>) -> Self {
        Self { tx, parser }
    }
}

impl<R: Read + Send + 'static> Worker for SourceWorker<R> {
    type Output = ParseReport;

    fn start(self) -> JoinHandle<Result<ParseReport>> {
        tokio::task::spawn_blocking(move || {
            let Self { tx, mut parser } = self;
            debug!("📥 SourceWorker started, parsing the input");

            for result in parser.by_ref() {
                let operation = result.context(
                    "💀 The parser choked on the input. Everything before this document was fine. \
                     Everything after it will never be read.",
                )?;
                if tx.send_blocking(operation).is_err() {
                    // -- 🛑 nobody is listening anymore, the run already ended downstream
                    debug!("🛑 SourceWorker: receiver is gone, stopping quietly");
                    break;
                }
            }

            let report = parser.report();
            debug!(
                "🏁 SourceWorker: parsed {} documents from {} bytes",
                report.documents, report.bytes
            );
            Ok(report)
        })
    }
}
