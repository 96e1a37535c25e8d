use anyhow::{Context, Result};
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::common::{Batch, Operation};
use crate::parser::ParseReport;

/// 📦 What one pull from the channel produced.
#[derive(Debug)]
pub(crate) enum Pull {
    /// 📦 exactly `bulk_size` operations, and maybe more behind them
    Full(Batch),
    /// 🏁 the short tail of the input; the parser already finished cleanly
    Last(Batch),
    /// 💤 nothing left at all
    Exhausted,
}

/// 🧺 Scoops exactly `bulk_size` operations off the channel, or notices that the
/// input ran dry.
///
/// The batcher holds the parser's JoinHandle. Once the channel closes it joins the
/// parser before handing out whatever is still pending: a parser that died on a bad
/// document takes the pending partial batch down with it.
#[derive(Debug)]
pub(crate) struct Batcher {
    rx: Receiver<Operation>,
    source: Option<JoinHandle<Result<ParseReport>>>,
    bulk_size: usize,
    report: Option<ParseReport>,
}

impl Batcher {
    pub(crate) fn new(
        rx: Receiver<Operation>,
        source: JoinHandle<Result<ParseReport>>,
        bulk_size: usize,
    ) -> Self {
        Self {
            rx,
            source: Some(source),
            bulk_size,
            report: None,
        }
    }

    pub(crate) async fn pull(&mut self) -> Result<Pull> {
        let mut batch = Batch::with_capacity(self.bulk_size);
        while batch.len() < self.bulk_size {
            match self.rx.recv().await {
                Ok(operation) => batch.push(operation),
                Err(_) => {
                    // -- 🚪 closed and drained. hear the parser out before anything leaves.
                    self.join_source().await?;
                    trace!("🧺 channel closed with {} operations pending", batch.len());
                    return Ok(if batch.is_empty() {
                        Pull::Exhausted
                    } else {
                        Pull::Last(batch)
                    });
                }
            }
        }
        Ok(Pull::Full(batch))
    }

    /// 📊 The parser's final numbers, once it has been joined.
    pub(crate) fn report(&self) -> Option<ParseReport> {
        self.report
    }

    async fn join_source(&mut self) -> Result<()> {
        if let Some(source) = self.source.take() {
            let report = source
                .await
                .context("💀 The parser thread panicked. Not an error, a full-on collapse.")??;
            self.report = Some(report);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::raw;
    use crate::error::LoadError;

    fn op(id: &str) -> Operation {
        Operation::index(id, raw("{}")).unwrap_or_else(|_| Operation::create(raw("{}")))
    }

    fn ids(batch: &Batch) -> Vec<&str> {
        batch
            .operations()
            .iter()
            .map(|op| op.id().unwrap_or_default())
            .collect()
    }

    /// 🧪 Stuff the channel, close it, and pretend a parser finished with `outcome`.
    async fn batcher_over(
        ids: &[&str],
        bulk_size: usize,
        outcome: Result<ParseReport>,
    ) -> anyhow::Result<Batcher> {
        let (tx, rx) = async_channel::unbounded();
        for id in ids {
            tx.send(op(id)).await?;
        }
        drop(tx);
        let source = tokio::spawn(async move { outcome });
        Ok(Batcher::new(rx, source, bulk_size))
    }

    #[tokio::test]
    async fn the_one_where_seven_docs_make_three_batches() -> anyhow::Result<()> {
        let mut batcher = batcher_over(
            &["1", "2", "3", "4", "5", "6", "7"],
            3,
            Ok(ParseReport { documents: 7, bytes: 70 }),
        )
        .await?;

        let mut seen = Vec::new();
        loop {
            match batcher.pull().await? {
                Pull::Full(batch) => seen.push(("full", ids(&batch).join(","))),
                Pull::Last(batch) => seen.push(("last", ids(&batch).join(","))),
                Pull::Exhausted => break,
            }
        }
        assert_eq!(
            seen,
            vec![
                ("full", "1,2,3".to_string()),
                ("full", "4,5,6".to_string()),
                ("last", "7".to_string()),
            ]
        );
        assert_eq!(batcher.report().map(|r| r.documents), Some(7));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_exact_multiple_ends_in_exhaustion() -> anyhow::Result<()> {
        let mut batcher =
            batcher_over(&["a", "b"], 2, Ok(ParseReport::default())).await?;
        assert!(matches!(batcher.pull().await?, Pull::Full(_)));
        assert!(matches!(batcher.pull().await?, Pull::Exhausted));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_parser_failure_eats_the_partial_batch() -> anyhow::Result<()> {
        let mut batcher = batcher_over(
            &["a", "b", "c"],
            2,
            Err(LoadError::MissingField {
                document: 4,
                field: "id".into(),
            }
            .into()),
        )
        .await?;

        assert!(matches!(batcher.pull().await?, Pull::Full(_)));
        let err = batcher
            .pull()
            .await
            .expect_err("💀 the pending [c] must not survive a parser failure");
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::MissingField { .. })
        ));
        Ok(())
    }
}
