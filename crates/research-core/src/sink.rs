//! Message sinks
//!
//! A [`MessageSink`] is the far end of a client connection. Analysts and the
//! stream relay only ever see this trait, never the socket itself.

use crate::{Result, StreamMessage};
use async_trait::async_trait;
use std::sync::Mutex;

/// Destination for server-to-client frames
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one frame
    ///
    /// Frames must reach the client in the order `send` is called.
    async fn send(&self, message: StreamMessage) -> Result<()>;

    /// Whether the client is still reachable
    fn is_open(&self) -> bool {
        true
    }
}

/// Sink that drops every frame; used by the HTTP endpoints
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl MessageSink for NullSink {
    async fn send(&self, _message: StreamMessage) -> Result<()> {
        Ok(())
    }
}

/// Sink that keeps every frame in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<StreamMessage>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the frames received so far
    pub fn messages(&self) -> Vec<StreamMessage> {
        self.messages
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send(&self, message: StreamMessage) -> Result<()> {
        let mut guard = self
            .messages
            .lock()
            .map_err(|e| crate::Error::SendFailed(format!("recording sink poisoned: {e}")))?;
        guard.push(message);
        Ok(())
    }
}
