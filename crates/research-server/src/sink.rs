//! Message sinks for socket sessions and the terminal

use async_trait::async_trait;
use research_core::{Error, MessageKind, MessageSink, Result, StreamMessage};
use std::collections::HashSet;
use std::io::Write;
use std::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;

/// Sink feeding one WebSocket connection's writer task
///
/// Frames are queued on an unbounded channel, so delivery order is send
/// order. After the client goes away every send fails with
/// [`Error::SendFailed`].
#[derive(Debug)]
pub struct ChannelSink {
    tx: UnboundedSender<StreamMessage>,
    client_id: String,
    /// Empty means every kind
    subscriptions: RwLock<HashSet<MessageKind>>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<StreamMessage>, client_id: impl Into<String>) -> Self {
        Self {
            tx,
            client_id: client_id.into(),
            subscriptions: RwLock::new(HashSet::new()),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Restrict delivery to the given kinds; returns the ones recognised
    pub fn subscribe(&self, types: &[String]) -> Vec<MessageKind> {
        let kinds: Vec<MessageKind> = types
            .iter()
            .filter_map(|t| serde_json::from_value(serde_json::Value::String(t.clone())).ok())
            .collect();
        if let Ok(mut subscriptions) = self.subscriptions.write() {
            *subscriptions = kinds.iter().copied().collect();
        }
        kinds
    }

    fn wants(&self, kind: MessageKind) -> bool {
        // Replies to the client's own requests always go through
        if matches!(
            kind,
            MessageKind::ConnectionEstablished
                | MessageKind::Pong
                | MessageKind::SystemStatus
                | MessageKind::ChatHistory
                | MessageKind::ChatHistoryCleared
                | MessageKind::ChatError
        ) {
            return true;
        }
        self.subscriptions
            .read()
            .map(|s| s.is_empty() || s.contains(&kind))
            .unwrap_or(true)
    }
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn send(&self, message: StreamMessage) -> Result<()> {
        if !self.wants(message.kind) {
            return Ok(());
        }
        self.tx
            .send(message.for_client(&self.client_id))
            .map_err(|_| Error::SendFailed(format!("client {} disconnected", self.client_id)))
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Sink printing streamed analysis text to stdout for the CLI
#[derive(Debug, Default)]
pub struct ConsoleSink;

#[async_trait]
impl MessageSink for ConsoleSink {
    async fn send(&self, message: StreamMessage) -> Result<()> {
        let field = |name: &str| {
            message
                .data
                .get(name)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        match message.kind {
            MessageKind::StreamingAiContent => {
                let mut stdout = std::io::stdout().lock();
                stdout
                    .write_all(field("chunk").as_bytes())
                    .and_then(|()| stdout.flush())
                    .map_err(|e| Error::SendFailed(e.to_string()))?;
            }
            MessageKind::StreamingAiContentFinal => println!(),
            MessageKind::ResearchSource => eprintln!("source: {} <{}>", field("title"), field("url")),
            MessageKind::AnalysisError => eprintln!("error: {}", field("error")),
            _ => {}
        }
        Ok(())
    }
}
