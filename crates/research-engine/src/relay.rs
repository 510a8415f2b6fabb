//! Forwards analyst output to a client as it is generated

use research_core::{AnalystKind, MessageKind, MessageSink, StreamMessage};
use research_llm::GroundingSource;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Per-analysis relay between the model stream and a [`MessageSink`]
///
/// Chunks are sent the moment they arrive, in arrival order. A failed send
/// is counted and logged but never aborts the analysis.
pub struct StreamRelay {
    sink: Arc<dyn MessageSink>,
    agent_id: String,
    analyst: AnalystKind,
    ticker: String,
    company: String,
    conversation_id: Option<String>,
    sequence: AtomicU64,
    send_failures: AtomicU64,
    warned: AtomicBool,
}

impl StreamRelay {
    pub fn new(
        sink: Arc<dyn MessageSink>,
        analyst: AnalystKind,
        ticker: impl Into<String>,
        company: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            agent_id: analyst.agent_id(),
            analyst,
            ticker: ticker.into(),
            company: company.into(),
            conversation_id: None,
            sequence: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            warned: AtomicBool::new(false),
        }
    }

    /// Tag every frame with a chat conversation so clients can tell chat
    /// replies from analysis output
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Chunks sent so far
    pub fn chunks_sent(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Frames the sink refused
    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::SeqCst)
    }

    /// One fragment of generated text
    pub async fn on_chunk(&self, chunk: &str) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut data = self.base();
        data.insert("chunk".into(), json!(chunk));
        data.insert("sequence".into(), json!(sequence));
        self.send(MessageKind::StreamingAiContent, data).await;
    }

    /// The complete text, once streaming is done
    pub async fn finish(&self, full_text: &str) {
        let mut data = self.base();
        data.insert("content".into(), json!(full_text));
        data.insert("company".into(), json!(self.company));
        data.insert("chunks".into(), json!(self.chunks_sent()));
        data.insert("is_final".into(), json!(true));
        self.send(MessageKind::StreamingAiContentFinal, data).await;
    }

    pub async fn status(&self, status: &str, message: &str) {
        let mut data = self.base();
        data.insert("status".into(), json!(status));
        data.insert("message".into(), json!(message));
        self.send(MessageKind::AgentStatus, data).await;
    }

    /// Structured output of a finished analysis
    pub async fn output(&self, output: Value) {
        let mut data = self.base();
        data.insert("output".into(), output);
        self.send(MessageKind::AgentOutput, data).await;
    }

    pub async fn source(&self, source: &GroundingSource) {
        let mut data = self.base();
        data.insert("title".into(), json!(source.title));
        data.insert("url".into(), json!(source.uri));
        self.send(MessageKind::ResearchSource, data).await;
    }

    pub async fn error(&self, error: &str) {
        let mut message = StreamMessage::analysis_error(self.analyst.id(), error);
        if let Value::Object(data) = &mut message.data {
            data.insert("agent_id".into(), json!(self.agent_id));
            data.insert("ticker".into(), json!(self.ticker));
        }
        self.deliver(message).await;
    }

    fn base(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("agent_id".into(), json!(self.agent_id));
        data.insert("analyst".into(), json!(self.analyst.id()));
        data.insert("ticker".into(), json!(self.ticker));
        if let Some(conversation_id) = &self.conversation_id {
            data.insert("conversation_id".into(), json!(conversation_id));
        }
        data
    }

    async fn send(&self, kind: MessageKind, data: Map<String, Value>) {
        self.deliver(StreamMessage::new(kind, Value::Object(data)))
            .await;
    }

    async fn deliver(&self, message: StreamMessage) {
        let kind = message.kind;
        if let Err(e) = self.sink.send(message).await {
            self.send_failures.fetch_add(1, Ordering::SeqCst);
            if self.warned.swap(true, Ordering::SeqCst) {
                debug!("{}: dropped {:?} frame: {}", self.agent_id, kind, e);
            } else {
                warn!(
                    "{}: client unreachable, output will not be delivered: {}",
                    self.agent_id, e
                );
            }
        }
    }
}

impl std::fmt::Debug for StreamRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRelay")
            .field("agent_id", &self.agent_id)
            .field("ticker", &self.ticker)
            .field("sequence", &self.chunks_sent())
            .field("send_failures", &self.send_failures())
            .finish_non_exhaustive()
    }
}
