//! 📄 The Stream Parser: concatenated JSON in, Operations out.
//!
//! 🎬 *[a byte stream with no brackets, no commas, no manners. just objects, back to back.]*
//!
//! 🧠 Knowledge graph:
//! - `serde_json`'s `StreamDeserializer` finds the value boundaries for us. Whitespace
//!   between values is optional, `{"a":1}{"b":2}` is fine.
//! - Each value is captured as a `RawValue`, so the document bytes go out exactly as
//!   they came in. The one exception: a document spread over several lines gets its
//!   line breaks turned into spaces, because the bulk body is line-delimited and a stray
//!   `\n` inside a document would tear it in half. Numbers and keys stay untouched.
//! - Every error is fatal. Malformed JSON has no safe resync point, and a missing id
//!   field on one document means the configuration is wrong for all of them.
//! - The parser is a plain `Iterator`. Running it on a thread and pushing into a channel
//!   is the SourceWorker's job, not ours.

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::de::IoRead;
use serde_json::value::RawValue;
use serde_json::{Map, StreamDeserializer, Value};

use crate::app_config::AppConfig;
use crate::common::Operation;
use crate::error::LoadError;

/// 🔧 What the parser needs to know from the run configuration.
#[derive(Debug, Clone, Default)]
pub(crate) struct ParserOptions {
    /// 🪪 `None` → every document becomes a create operation.
    pub(crate) id_field: Option<String>,
    /// 🧭 `None` → no per-document `_index`.
    pub(crate) index_field: Option<String>,
}

impl From<&AppConfig> for ParserOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            id_field: config.id_field().map(str::to_string),
            index_field: config.index_field().map(str::to_string),
        }
    }
}

/// 📊 What a finished parse leaves behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub documents: u64,
    pub bytes: u64,
}

/// 📄 Lazily turns a byte stream into `Operation`s. Finite, not restartable: the reader
/// is consumed as we go.
pub(crate) struct OperationParser<R: Read> {
    stream: StreamDeserializer<'static, IoRead<R>, Box<RawValue>>,
    options: ParserOptions,
    documents: u64,
    /// 📏 byte offset shared with the progress display
    offset: Arc<AtomicU64>,
    failed: bool,
}

impl<R: Read> std::fmt::Debug for OperationParser<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationParser")
            .field("options", &self.options)
            .field("documents", &self.documents)
            .finish()
    }
}

impl<R: Read> OperationParser<R> {
    pub(crate) fn new(reader: R, options: ParserOptions, offset: Arc<AtomicU64>) -> Self {
        Self {
            stream: serde_json::Deserializer::from_reader(reader).into_iter(),
            options,
            documents: 0,
            offset,
            failed: false,
        }
    }

    /// 📊 Documents decoded and bytes consumed so far.
    pub(crate) fn report(&self) -> ParseReport {
        ParseReport {
            documents: self.documents,
            bytes: self.stream.byte_offset() as u64,
        }
    }

    fn build(&self, raw: Box<RawValue>) -> Result<Operation, LoadError> {
        if !raw.get().starts_with('{') {
            return Err(LoadError::Parse {
                document: self.documents,
                offset: self.stream.byte_offset(),
                source: serde::de::Error::custom(format!(
                    "expected a JSON object, found `{}`",
                    preview(raw.get())
                )),
            });
        }

        // -- 🔍 only pay for a full parse when there is a field to look up
        let fields = if self.options.id_field.is_some() || self.options.index_field.is_some() {
            Some(
                serde_json::from_str::<Map<String, Value>>(raw.get()).map_err(|source| {
                    LoadError::Parse {
                        document: self.documents,
                        offset: self.stream.byte_offset(),
                        source,
                    }
                })?,
            )
        } else {
            None
        };

        let document = single_line(raw).map_err(|source| LoadError::Parse {
            document: self.documents,
            offset: self.stream.byte_offset(),
            source,
        })?;

        let mut operation = match (&self.options.id_field, &fields) {
            (Some(field), Some(fields)) => {
                let id = string_field(fields, field).ok_or_else(|| LoadError::MissingField {
                    document: self.documents,
                    field: field.clone(),
                })?;
                Operation::index(id, document)?
            }
            _ => Operation::create(document),
        };

        if let (Some(field), Some(fields)) = (&self.options.index_field, &fields) {
            let index = string_field(fields, field).ok_or_else(|| LoadError::MissingField {
                document: self.documents,
                field: field.clone(),
            })?;
            operation = operation.with_target_index(index);
        }

        Ok(operation)
    }
}

impl<R: Read> Iterator for OperationParser<R> {
    type Item = Result<Operation, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = self.stream.next()?;
        self.documents += 1;
        self.offset
            .store(self.stream.byte_offset() as u64, Ordering::Relaxed);

        let result = next
            .map_err(|source| LoadError::Parse {
                document: self.documents,
                offset: self.stream.byte_offset(),
                source,
            })
            .and_then(|raw| self.build(raw));
        if result.is_err() {
            // -- 💀 no resync after a bad value, the iterator is done for good
            self.failed = true;
        }
        Some(result)
    }
}

/// 🪪 A top-level string field with something in it. Numbers don't count, neither does "".
fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name) {
        Some(Value::String(value)) if !value.is_empty() => Some(value.clone()),
        _ => None,
    }
}

/// 📏 Make sure a document fits on one NDJSON line. Newlines can only appear between
/// tokens in valid JSON, so swapping each one for a space keeps every number, key and
/// string byte-for-byte. A document without any is already fine as-is.
fn single_line(raw: Box<RawValue>) -> Result<Box<RawValue>, serde_json::Error> {
    if !raw.get().contains(['\n', '\r']) {
        return Ok(raw);
    }
    RawValue::from_string(raw.get().replace(['\n', '\r'], " "))
}

fn preview(raw: &str) -> String {
    raw.chars().take(32).collect()
}
