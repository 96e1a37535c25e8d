//! 🧪 An in-memory sink, for tests. It never forgets. Unlike my dad, who forgot my
//! soccer game in 1998.
//!
//! ⚠️ This is NOT for production. This is for tests. If you're deploying this to prod,
//! please also deploy a therapist.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backends::Sink;
use crate::error::LoadError;

/// 📦 One request the sink swallowed: the index it was aimed at, and the body.
#[derive(Debug, Clone)]
pub(crate) struct ReceivedBulk {
    pub(crate) index: String,
    pub(crate) body: Vec<u8>,
}

impl ReceivedBulk {
    /// 🔪 Split the body back into its NDJSON lines, for assertions.
    pub(crate) fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.body)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// 📦 Hoards every body in an `Arc<Mutex<Vec<...>>>` so a test can peek after the
/// pipeline took ownership of the sink. Types all the way down.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemorySink {
    pub(crate) received: Arc<Mutex<Vec<ReceivedBulk>>>,
    pub(crate) closed: Arc<Mutex<bool>>,
    /// 💣 Refuse the n-th request (0-based) like a grumpy cluster would.
    reject_at: Option<usize>,
}

impl InMemorySink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn rejecting_at(request_number: usize) -> Self {
        Self {
            reject_at: Some(request_number),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn send(&mut self, body: Vec<u8>, index: &str) -> Result<()> {
        let mut received = self.received.lock().await;
        if self.reject_at == Some(received.len()) {
            return Err(LoadError::BulkRejected {
                status: 400,
                body: br#"{"error":"in-memory sink says no"}"#.to_vec(),
            }
            .into());
        }
        received.push(ReceivedBulk {
            index: index.to_string(),
            body,
        });
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        *self.closed.lock().await = true;
        Ok(())
    }
}
