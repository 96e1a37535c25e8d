//! 📦 Common data structures: the Operation and the Batch.
//!
//! 🎬 COLD OPEN. INT. STDIN. 2:14 AM.
//!
//! A JSON object arrives. It does not know where it is going. It does not know it is
//! about to get an action line stapled to its forehead. It only knows it is an object,
//! and that, for now, is enough.
//!
//! 🧠 Knowledge graph:
//! - `Operation` = one action (create, or index-with-id) + one document. Immutable.
//! - The id lives *inside* `Action::Index`, so "create XOR index" and "index has an id"
//!   are facts the compiler enforces instead of facts we hope for.
//! - `document` is a `RawValue`: the bytes we decoded, carried verbatim to the encoder.
//! - `Batch` = up to `bulk_size` Operations, in input order, alive for one request. 🦆

use serde::Serialize;
use serde_json::value::RawValue;

use crate::error::LoadError;

/// 🎯 What the engine should do with a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// 🆕 Insert, let the engine pick the id.
    Create,
    /// 🪪 Upsert under a caller-supplied id. Never empty.
    Index { id: String },
}

/// 📄 One pending write: an action directive plus the document it applies to.
#[derive(Debug, Clone)]
pub struct Operation {
    action: Action,
    /// 📡 Per-document destination index. `None` means "whatever the run is targeting".
    target_index: Option<String>,
    document: Box<RawValue>,
}

impl Operation {
    /// 🆕 A create operation. No id, no drama.
    pub fn create(document: Box<RawValue>) -> Self {
        Self {
            action: Action::Create,
            target_index: None,
            document,
        }
    }

    /// 🪪 An index operation. An empty id is refused here, once, so nobody downstream
    /// has to wonder about it.
    pub fn index(id: impl Into<String>, document: Box<RawValue>) -> Result<Self, LoadError> {
        let id = id.into();
        if id.is_empty() {
            return Err(LoadError::Config(
                "an index operation needs a non-empty id".to_string(),
            ));
        }
        Ok(Self {
            action: Action::Index { id },
            target_index: None,
            document,
        })
    }

    /// 📡 Route this one document somewhere other than the run's index.
    pub fn with_target_index(mut self, index: impl Into<String>) -> Self {
        self.target_index = Some(index.into());
        self
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn id(&self) -> Option<&str> {
        match &self.action {
            Action::Create => None,
            Action::Index { id } => Some(id),
        }
    }

    pub fn target_index(&self) -> Option<&str> {
        self.target_index.as_deref()
    }

    pub fn document(&self) -> &RawValue {
        &self.document
    }

    /// 🏗️ The serde view of the action line for this operation.
    pub(crate) fn action_line(&self) -> ActionLine<'_> {
        let meta = ActionMeta {
            id: self.id(),
            index: self.target_index(),
        };
        match self.action {
            Action::Create => ActionLine::Create(meta),
            Action::Index { .. } => ActionLine::Index(meta),
        }
    }
}

/// 📜 `{"create":{...}}` or `{"index":{...}}`. Externally tagged, which is serde's default
/// and, conveniently, exactly what the bulk API wants.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ActionLine<'a> {
    Create(ActionMeta<'a>),
    Index(ActionMeta<'a>),
}

/// 🏷️ Action metadata. Absent fields are omitted, never `null`.
#[derive(Debug, Serialize)]
pub(crate) struct ActionMeta<'a> {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(rename = "_index", skip_serializing_if = "Option::is_none")]
    index: Option<&'a str>,
}

/// 📦 A `Batch`: up to N operations headed out in one request.
///
/// Shorter than N only when the input ran dry. It lives for exactly one encode and one
/// dispatch, then it is dropped and nobody speaks of it again.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub(crate) operations: Vec<Operation>,
}

impl Batch {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            operations: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// 📊 Total document bytes in this batch. One iterator, one map, one sum.
    pub fn total_document_bytes(&self) -> usize {
        self.operations
            .iter()
            .map(|operation| operation.document().get().len())
            .sum()
    }
}

impl From<Vec<Operation>> for Batch {
    fn from(operations: Vec<Operation>) -> Self {
        Self { operations }
    }
}

/// 🏁 What a finished run has to show for itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// 📦 bulk requests the engine accepted
    pub batches: u64,
    /// 📄 operations inside those requests
    pub operations: u64,
    /// 📡 request body bytes sent
    pub request_bytes: u64,
    /// 📥 input bytes the parser consumed
    pub input_bytes: u64,
}

#[cfg(test)]
pub(crate) fn raw(json: &str) -> Box<RawValue> {
    RawValue::from_string(json.to_string())
        .expect("💀 test fixture was not valid JSON. the fixture is the bug.")
}
