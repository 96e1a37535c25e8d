//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where workers toil endlessly..."
//! 🎬 "One supervisor dared to manage them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor runs the show, in this order and no other:
//!
//! ```text
//! Init ──▶ Probing ──▶ Streaming ──▶ Done
//!             │            │
//!             └────────────┴──────▶ FatalAbort
//! ```
//!
//! - **Probing**: say hello to the cluster, maybe discover its nodes. Nothing is read yet.
//! - **Streaming**: open the input, start the SourceWorker and the SinkWorker, wait.
//! - **Done**: input exhausted, every bulk request said yes.
//! - **FatalAbort**: anything else. The error goes up the stack with its context pile.
//!
//! ⚠️ DO NOT MAKE THE WORKERS PUB EVER. Like Fight Club, but for async tasks.

mod workers;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::app_config::AppConfig;
use crate::backends::Sink;
use crate::backends::elasticsearch::ElasticsearchSink;
use crate::backends::source::{InputSource, OpenedInput};
use crate::common::RunSummary;
use crate::error::LoadError;
use crate::parser::{OperationParser, ParserOptions};
use crate::progress::ProgressMetrics;
use workers::{Batcher, SinkWorker, SourceWorker, Worker};

/// 📦 The Supervisor: because even async tasks need someone hovering over them
/// asking "is it done yet?"
#[derive(Debug)]
pub(crate) struct Supervisor {
    /// 🔧 The sacred scrolls of configuration, passed down from main()
    app_config: AppConfig,
}

impl Supervisor {
    /// 🏗️ A Supervisor only exists with a configuration that passed `validate()`. Library
    /// callers can build an `AppConfig` by hand, so the check lives here and not only in
    /// `load_config`.
    pub(crate) fn new(app_config: AppConfig) -> Result<Self> {
        app_config
            .validate()
            .inspect_err(|_| warn!("💀 Init → FatalAbort (invalid configuration)"))
            .context("💀 The configuration asks for something impossible. Nothing was sent.")?;
        Ok(Self { app_config })
    }

    /// 🚀 Probe, open the configured input, stream it.
    pub(crate) async fn run(&self) -> Result<RunSummary> {
        let sink = self.probe().await?;
        let input = InputSource::from_config(&self.app_config.data_source)
            .open()
            .inspect_err(|_| warn!("💀 Probing → FatalAbort (input would not open)"))?;
        self.stream(input, sink).await
    }

    /// 🚀 Probe, then stream an input the caller already opened.
    pub(crate) async fn run_with_input(&self, input: OpenedInput) -> Result<RunSummary> {
        let sink = self.probe().await?;
        self.stream(input, sink).await
    }

    async fn probe(&self) -> Result<ElasticsearchSink> {
        info!("🚦 Init → Probing {}", self.app_config.es_address);
        let mut sink = ElasticsearchSink::new(&self.app_config)?;
        if let Err(err) = sink.probe().await {
            warn!("💀 Probing → FatalAbort");
            return Err(err).context(format!(
                "💀 Could not get a straight answer from {}. Is the cluster up? Is the address right?",
                self.app_config.es_address
            ));
        }
        Ok(sink)
    }

    /// 🌊 Wire parser → channel → batcher → encoder → sink, and wait for the verdict.
    pub(crate) async fn stream<S: Sink + 'static>(
        &self,
        input: OpenedInput,
        sink: S,
    ) -> Result<RunSummary> {
        info!(
            "🚦 Probing → Streaming '{}' into index '{}' ({} operations per batch)",
            input.name, self.app_config.index_name, self.app_config.bulk_size
        );

        let (tx, rx) = async_channel::bounded(self.app_config.runtime.queue_capacity);
        let input_offset = Arc::new(AtomicU64::new(0));
        let parser = OperationParser::new(
            input.reader,
            ParserOptions::from(&self.app_config),
            input_offset.clone(),
        );
        let source = SourceWorker::new(tx, parser).start();
        let batcher = Batcher::new(rx, source, self.app_config.bulk_size);
        let progress = ProgressMetrics::new(
            input.name,
            input.size,
            input_offset,
            self.app_config.runtime.progress,
        );

        let outcome = SinkWorker::new(
            batcher,
            sink,
            self.app_config.index_name.clone(),
            progress,
        )
        .start()
        .await
        .context("💀 The sink worker panicked. The pipeline is in pieces.")?;

        match outcome {
            Ok(summary) => {
                info!(
                    "🏁 Streaming → Done: {} operations in {} batches ({} request bytes, {} input bytes)",
                    summary.operations, summary.batches, summary.request_bytes, summary.input_bytes
                );
                Ok(summary)
            }
            Err(err) => {
                let kind = err
                    .downcast_ref::<LoadError>()
                    .map(LoadError::kind)
                    .unwrap_or("unknown");
                warn!("💀 Streaming → FatalAbort ({})", kind);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::SENTINEL;
    use crate::backends::in_mem::InMemorySink;
    use crate::backends::elasticsearch::TransportConfig;
    use std::io::{Cursor, Write};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(bulk_size: usize) -> AppConfig {
        let mut config = AppConfig {
            bulk_size,
            ..AppConfig::default()
        };
        config.runtime.progress = false;
        config
    }

    fn input(text: &str) -> OpenedInput {
        OpenedInput::from_reader("test", Cursor::new(text.as_bytes().to_vec()))
    }

    async fn stream(
        config: AppConfig,
        text: &str,
        sink: &InMemorySink,
    ) -> anyhow::Result<RunSummary> {
        Supervisor::new(config)?.stream(input(text), sink.clone()).await
    }

    #[tokio::test]
    async fn the_one_where_three_docs_and_a_bulk_size_of_two_make_two_requests() -> anyhow::Result<()> {
        let sink = InMemorySink::new();
        let summary = stream(
            config(2),
            r#"{"id":"a","v":1}{"id":"b","v":2}{"id":"c","v":3}"#,
            &sink,
        )
        .await?;

        let received = sink.received.lock().await;
        assert_eq!(received.len(), 2);
        assert_eq!(
            received[0].lines(),
            vec![
                r#"{"index":{"_id":"a"}}"#,
                r#"{"id":"a","v":1}"#,
                r#"{"index":{"_id":"b"}}"#,
                r#"{"id":"b","v":2}"#,
            ]
        );
        assert_eq!(
            received[1].lines(),
            vec![r#"{"index":{"_id":"c"}}"#, r#"{"id":"c","v":3}"#]
        );
        assert!(received.iter().all(|bulk| bulk.index == "index"));
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.operations, 3);
        assert!(*sink.closed.lock().await);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_sentinel_turns_everything_into_creates() -> anyhow::Result<()> {
        let sink = InMemorySink::new();
        let config = AppConfig {
            id_field: SENTINEL.to_string(),
            ..config(10)
        };
        stream(config, r#"{"id":"x"} {"name":"no id, no problem"}"#, &sink).await?;

        let received = sink.received.lock().await;
        let lines = received[0].lines();
        assert_eq!(lines[0], r#"{"create":{}}"#);
        assert_eq!(lines[2], r#"{"create":{}}"#);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_missing_id_sends_nothing_for_its_batch() -> anyhow::Result<()> {
        let sink = InMemorySink::new();
        let err = stream(config(2), r#"{"id":"a"}{"name":"oops"}{"id":"c"}"#, &sink)
            .await
            .expect_err("💀 a document without an id should end the run");

        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::MissingField { document: 2, .. })
        ));
        assert!(sink.received.lock().await.is_empty());
        assert!(!*sink.closed.lock().await);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_full_batches_before_the_bad_document_still_land() -> anyhow::Result<()> {
        let sink = InMemorySink::new();
        let result = stream(config(1), r#"{"id":"a"}{"id":"b"}{"id": 3}"#, &sink).await;

        assert!(result.is_err());
        let received = sink.received.lock().await;
        assert_eq!(received.len(), 2);
        assert_eq!(received[1].lines()[0], r#"{"index":{"_id":"b"}}"#);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_rejection_stops_everything_after_it() -> anyhow::Result<()> {
        let sink = InMemorySink::rejecting_at(1);
        let err = stream(config(1), r#"{"id":"a"}{"id":"b"}{"id":"c"}"#, &sink)
            .await
            .expect_err("💀 the second batch was rejected");

        match err.downcast_ref::<LoadError>() {
            Some(LoadError::BulkRejected { status, body }) => {
                assert_eq!(*status, 400);
                assert!(!body.is_empty());
            }
            other => panic!("💀 expected BulkRejected, got {other:?}"),
        }
        assert_eq!(sink.received.lock().await.len(), 1, "no batch after the rejected one");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_empty_input_is_a_quiet_success() -> anyhow::Result<()> {
        let sink = InMemorySink::new();
        let summary = stream(config(5), "", &sink).await?;
        assert_eq!(summary, RunSummary::default());
        assert!(sink.received.lock().await.is_empty());
        assert!(*sink.closed.lock().await);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_order_survives_every_batch_boundary() -> anyhow::Result<()> {
        let docs: String = (0..23).map(|n| format!(r#"{{"id":"doc-{n}"}}"#)).collect();
        let mut config = config(5);
        config.runtime.queue_capacity = 3;

        let sink = InMemorySink::new();
        let summary = stream(config, &docs, &sink).await?;

        let received = sink.received.lock().await;
        // -- 🧮 ceil(23 / 5) = 5 requests, the last one carrying 23 mod 5 = 3
        assert_eq!(received.len(), 5);
        assert_eq!(received[4].lines().len(), 6);
        let ids: Vec<String> = received
            .iter()
            .flat_map(|bulk| bulk.lines())
            .step_by(2)
            .collect();
        let expected: Vec<String> = (0..23)
            .map(|n| format!(r#"{{"index":{{"_id":"doc-{n}"}}}}"#))
            .collect();
        assert_eq!(ids, expected);
        assert_eq!(summary.input_bytes, docs.len() as u64);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_documents_route_themselves() -> anyhow::Result<()> {
        let sink = InMemorySink::new();
        let config = AppConfig {
            index_field: "tenant".to_string(),
            ..config(10)
        };
        stream(config, r#"{"id":"1","tenant":"acme"}"#, &sink).await?;

        let received = sink.received.lock().await;
        assert_eq!(
            received[0].lines()[0],
            r#"{"index":{"_id":"1","_index":"acme"}}"#
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_whole_show_runs_against_a_fake_cluster() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "node-1", "cluster_name": "fake", "version": {"number": "8.13.0"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/_nodes/http"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "nodes": {"n1": {"roles": ["data"], "http": {"publish_address": server.address().to_string()}}}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/products/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "took": 1, "errors": false, "items": []
            })))
            .expect(2)
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, r#"{{"sku":"a1"}}"#)?;
        writeln!(file, r#"{{"sku":"b2"}}"#)?;
        writeln!(file, r#"{{"sku":"c3"}}"#)?;

        let config = AppConfig {
            es_address: server.uri(),
            bulk_size: 2,
            id_field: "sku".to_string(),
            index_name: "products".to_string(),
            data_source: file.path().display().to_string(),
            transport: TransportConfig {
                max_retries: 0,
                ..TransportConfig::default()
            },
            ..config(2)
        };
        let summary = Supervisor::new(config)?.run().await?;
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.operations, 3);

        let requests = server.received_requests().await.unwrap_or_default();
        let bulk_bodies: Vec<String> = requests
            .iter()
            .filter(|request| request.url.path() == "/products/_bulk")
            .map(|request| String::from_utf8_lossy(&request.body).into_owned())
            .collect();
        assert_eq!(
            bulk_bodies,
            vec![
                "{\"index\":{\"_id\":\"a1\"}}\n{\"sku\":\"a1\"}\n{\"index\":{\"_id\":\"b2\"}}\n{\"sku\":\"b2\"}\n",
                "{\"index\":{\"_id\":\"c3\"}}\n{\"sku\":\"c3\"}\n",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_dead_cluster_means_the_input_is_never_opened() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let config = AppConfig {
            es_address: server.uri(),
            data_source: "/definitely/not/here.json".to_string(),
            transport: TransportConfig {
                max_retries: 0,
                ..TransportConfig::default()
            },
            ..config(2)
        };
        let err = Supervisor::new(config)?
            .run()
            .await
            .expect_err("💀 a 503 is not a healthy cluster");
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::Probe(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_zero_bulk_size_never_reaches_the_sink() -> anyhow::Result<()> {
        let sink = InMemorySink::new();
        let err = stream(config(0), r#"{"id":"a"}"#, &sink)
            .await
            .expect_err("💀 a bulk size of zero is not a bulk size");
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::Config(_))
        ));
        assert!(sink.received.lock().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_zero_slot_queue_is_a_config_error_not_a_panic() -> anyhow::Result<()> {
        let sink = InMemorySink::new();
        let mut config = config(2);
        config.runtime.queue_capacity = 0;
        let err = stream(config, r#"{"id":"a"}"#, &sink)
            .await
            .expect_err("💀 a channel with no room is refused up front");
        match err.downcast_ref::<LoadError>() {
            Some(LoadError::Config(msg)) => assert!(msg.contains("queue_capacity")),
            other => panic!("💀 expected a Config error, got {other:?}"),
        }
        assert!(sink.received.lock().await.is_empty());
        Ok(())
    }
}
