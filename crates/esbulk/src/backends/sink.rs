use anyhow::Result;
use async_trait::async_trait;

/// 🕳️ A sink that sends pre-encoded bulk bodies. Pure I/O, zero logic.
///
/// The drain at the bottom of the pipeline tub. Sinks don't batch, don't encode and
/// don't retry batches; the SinkWorker upstream already did the batching and encoding.
/// A sink gets one finished body and one target index, and either it lands or it doesn't.
///
/// # Contract 📜
/// - `send` performs exactly one bulk write. `Ok(())` means the engine said yes.
///   Anything else is fatal for the run: transport trouble, or an engine that said no.
/// - `close` releases whatever the sink holds. Call it once the stream is exhausted.
///
/// # Knowledge Graph 🧠
/// - Pattern: trait → concrete impls (ElasticsearchSink, and an in-memory one for tests)
/// - SinkWorker does: pull batch → encode → `sink.send(body, index)`
/// - Ancient proverb: "He who puts business logic in the Sink, debugs in production."
#[async_trait]
pub(crate) trait Sink: std::fmt::Debug + Send {
    /// 📡 Write one encoded bulk body into `index`. I/O only. No questions asked.
    async fn send(&mut self, body: Vec<u8>, index: &str) -> Result<()>;
    /// 🗑️ Flush, finalize, release.
    async fn close(&mut self) -> Result<()>;
}
