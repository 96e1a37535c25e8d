//! 🎬 *[a channel fills with operations. somewhere, a sink waits.]*
//! *[the clock on the wall reads 2:47am.]*
//!
//! 🗑️ The SinkWorker: pull a batch, encode it, send it, repeat. Patient, tireless, and
//! deeply unbothered by the chaos upstream. It is, in many ways, the most emotionally
//! stable part of this codebase.
//!
//! 🧠 Knowledge graph:
//! - Exactly one bulk request in flight. The next batch isn't even pulled until the
//!   current one has been answered.
//! - Any error ends the loop on the spot. No batch is retried here, and nothing after
//!   a failed batch is sent.
//! - On the way out, clean or not, the Batcher (and with it the channel receiver) is
//!   dropped, which is how a blocked parser finds out the party is over.

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::debug;

use super::Worker;
use super::batcher::{Batcher, Pull};
use crate::backends::Sink;
use crate::common::RunSummary;
use crate::composers::NdjsonBulkComposer;
use crate::progress::ProgressMetrics;

#[derive(Debug)]
pub(crate) struct SinkWorker<S: Sink> {
    batcher: Batcher,
    sink: S,
    composer: NdjsonBulkComposer,
    index_name: String,
    progress: ProgressMetrics,
}

impl<S: Sink> SinkWorker<S> {
    /// 🏗️ Hand it a batcher (the firehose) and a sink (the drain). It does not judge.
    pub(crate) fn new(
        batcher: Batcher,
        sink: S,
        index_name: String,
        progress: ProgressMetrics,
    ) -> Self {
        Self {
            batcher,
            sink,
            composer: NdjsonBulkComposer,
            index_name,
            progress,
        }
    }

    async fn drain(&mut self) -> Result<()> {
        loop {
            let (batch, last) = match self.batcher.pull().await? {
                Pull::Full(batch) => (batch, false),
                Pull::Last(batch) => (batch, true),
                Pull::Exhausted => return Ok(()),
            };
            let number = self.progress.total_batches() + 1;

            let body = self
                .composer
                .compose(&batch)
                .with_context(|| format!("💀 Batch #{number} could not be encoded"))?;
            let (operations, bytes) = (batch.len() as u64, body.len() as u64);
            drop(batch);

            debug!(
                "🪣 SinkWorker: dispatching batch #{} ({} operations, {} bytes)",
                number, operations, bytes
            );
            self.sink
                .send(body, &self.index_name)
                .await
                .with_context(|| {
                    format!("💀 Batch #{number} ({operations} operations) did not make it into '{}'", self.index_name)
                })?;
            self.progress.update(operations, bytes);

            if last {
                return Ok(());
            }
        }
    }
}

impl<S: Sink + 'static> Worker for SinkWorker<S> {
    type Output = RunSummary;

    fn start(mut self) -> JoinHandle<Result<RunSummary>> {
        tokio::spawn(async move {
            debug!("📥 SinkWorker started draining the channel");
            if let Err(err) = self.drain().await {
                self.progress.abandon();
                return Err(err);
            }
            self.sink
                .close()
                .await
                .context("💀 SinkWorker failed to close the sink")?;
            self.progress.finish();
            debug!("🏁 SinkWorker: input exhausted, sink closed");

            Ok(RunSummary {
                batches: self.progress.total_batches(),
                operations: self.progress.total_docs(),
                request_bytes: self.progress.request_bytes(),
                input_bytes: self.batcher.report().map(|report| report.bytes).unwrap_or(0),
            })
        })
    }
}
