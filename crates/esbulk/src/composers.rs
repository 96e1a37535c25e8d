//! 🎬 *[a dark and stormy deploy. the bulk API demands pairs of lines. the composer obliges.]*
//!
//! 📡 **Bulk Encoder**: a `Batch` goes in, a `_bulk` request body comes out.
//!
//! 🧠 Knowledge graph:
//! - Two lines per operation: the action line, then the document. Each ends with `\n`,
//!   the last one included. The trailing newline is mandatory; three engineers lost
//!   weekends to this.
//! - Order is sacred: operations are written in the order the parser produced them.
//! - The document line is the raw document, byte for byte. The encoder never looks inside.
//! - Encoding can only fail if the writer fails. For the in-memory `Vec<u8>` body that
//!   basically means never, but the error path is real and it is fatal: a half-written
//!   body must never be sent.
//!
//! 🦆 The duck asked what NDJSON stands for. We told it. It left anyway.

use std::io::Write;

use crate::common::Batch;
use crate::error::LoadError;

/// 📡 Renders batches into newline-delimited bulk bodies.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct NdjsonBulkComposer;

impl NdjsonBulkComposer {
    /// 📦 Encode a batch into a fresh body buffer.
    pub(crate) fn compose(&self, batch: &Batch) -> Result<Vec<u8>, LoadError> {
        // -- 🧮 documents + roughly one action line each, a vibes-based estimate that's usually close
        let estimated_size = batch.total_document_bytes() + batch.len() * 48;
        let mut body = Vec::with_capacity(estimated_size);
        self.compose_into(batch, &mut body)?;
        Ok(body)
    }

    /// ✍️ Encode a batch into any writer.
    pub(crate) fn compose_into<W: Write>(&self, batch: &Batch, out: &mut W) -> Result<(), LoadError> {
        for operation in batch.operations() {
            serde_json::to_writer(&mut *out, &operation.action_line()).map_err(LoadError::Encode)?;
            out.write_all(b"\n")
                .map_err(|err| LoadError::Encode(serde_json::Error::io(err)))?;
            out.write_all(operation.document().get().as_bytes())
                .map_err(|err| LoadError::Encode(serde_json::Error::io(err)))?;
            out.write_all(b"\n")
                .map_err(|err| LoadError::Encode(serde_json::Error::io(err)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Operation, raw};

    fn compose(ops: Vec<Operation>) -> anyhow::Result<String> {
        let body = NdjsonBulkComposer.compose(&Batch::from(ops))?;
        Ok(String::from_utf8(body)?)
    }

    #[test]
    fn the_one_where_index_ops_become_pairs_of_lines() -> anyhow::Result<()> {
        let body = compose(vec![
            Operation::index("a", raw(r#"{"id":"a","n":1}"#))?,
            Operation::index("b", raw(r#"{"id":"b","n":2}"#))?,
        ])?;
        assert_eq!(
            body,
            concat!(
                "{\"index\":{\"_id\":\"a\"}}\n",
                "{\"id\":\"a\",\"n\":1}\n",
                "{\"index\":{\"_id\":\"b\"}}\n",
                "{\"id\":\"b\",\"n\":2}\n",
            )
        );
        Ok(())
    }

    #[test]
    fn the_one_where_create_ops_stay_anonymous() -> anyhow::Result<()> {
        let body = compose(vec![Operation::create(raw(r#"{"id":"ignored"}"#))])?;
        assert_eq!(body, "{\"create\":{}}\n{\"id\":\"ignored\"}\n");
        Ok(())
    }

    #[test]
    fn the_one_where_an_id_full_of_quotes_gets_escaped() -> anyhow::Result<()> {
        let body = compose(vec![Operation::index("say \"cheese\"", raw("{}"))?])?;
        let action: serde_json::Value = serde_json::from_str(body.lines().next().unwrap_or_default())?;
        assert_eq!(action["index"]["_id"], "say \"cheese\"");
        Ok(())
    }

    #[test]
    fn the_one_where_encoding_twice_gives_the_same_bytes() -> anyhow::Result<()> {
        let batch = Batch::from(vec![
            Operation::index("1", raw(r#"{"z":1,"a":2}"#))?,
            Operation::create(raw(r#"{"emoji":"🔥"}"#)).with_target_index("elsewhere"),
        ]);
        let first = NdjsonBulkComposer.compose(&batch)?;
        let second = NdjsonBulkComposer.compose(&batch)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn the_one_where_an_empty_batch_is_an_empty_body() -> anyhow::Result<()> {
        assert!(compose(vec![])?.is_empty());
        Ok(())
    }

    /// 💣 A writer that gives up after a few bytes, like a pen running out of ink mid-signature.
    struct FlakyWriter {
        budget: usize,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.budget == 0 {
                return Err(std::io::Error::other("disk full, hopes dashed"));
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn the_one_where_a_failing_writer_is_an_encode_error() -> anyhow::Result<()> {
        let batch = Batch::from(vec![Operation::index("a", raw(r#"{"id":"a"}"#))?]);
        let mut out = FlakyWriter { budget: 5 };
        let result = NdjsonBulkComposer.compose_into(&batch, &mut out);
        assert!(matches!(result, Err(LoadError::Encode(_))));
        Ok(())
    }
}
