//! Wire messages exchanged with WebSocket clients
//!
//! Server frames are `{"type": ..., "data": {...}, "timestamp": ...}`;
//! client frames are flat JSON objects tagged by `type`.

use crate::context::DataSources;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Tag of a server-to-client frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ConnectionEstablished,
    AnalysisStarted,
    AgentStatus,
    AgentOutput,
    StreamingAiContent,
    StreamingAiContentFinal,
    ResearchSource,
    CompleteInvestmentReport,
    StreamingAnalysisCompleted,
    ReportCompleted,
    AnalysisError,
    BulkAnalysisError,
    ChatResponse,
    ChatHistory,
    ChatHistoryCleared,
    ChatError,
    Pong,
    SystemStatus,
}

/// Server-to-client frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl StreamMessage {
    pub fn new(kind: MessageKind, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
            client_id: None,
        }
    }

    pub fn for_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Serialize to the JSON text sent over the socket
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn connection_established(client_id: &str, capabilities: &[&str]) -> Self {
        Self::new(
            MessageKind::ConnectionEstablished,
            json!({
                "client_id": client_id,
                "server": "research-rs",
                "capabilities": capabilities,
            }),
        )
        .for_client(client_id)
    }

    pub fn pong() -> Self {
        Self::new(MessageKind::Pong, json!({}))
    }

    pub fn analysis_error(analyst: &str, error: impl std::fmt::Display) -> Self {
        Self::new(
            MessageKind::AnalysisError,
            json!({
                "error": format!("AI Analysis Error: {error}"),
                "analyst": analyst,
            }),
        )
    }
}

/// Client-to-server frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Run one analyst and stream its output
    StartAnalysis {
        #[serde(default = "default_analyst")]
        analyst: String,
        ticker: String,
        company: String,
        #[serde(default)]
        user_query: Option<String>,
        #[serde(flatten)]
        sources: DataSources,
    },
    /// Run several analysts and stitch an HTML report
    GenerateReport {
        ticker: String,
        company: String,
        #[serde(default)]
        analysts: Option<Vec<String>>,
        #[serde(flatten)]
        sources: DataSources,
    },
    /// Follow-up question to an analyst about its finished analysis
    ChatMessage {
        #[serde(default = "default_analyst")]
        analyst: String,
        message: String,
        #[serde(default)]
        ticker: String,
        #[serde(default)]
        company: String,
        /// Analysis text to discuss; the stored result is used when absent
        #[serde(default)]
        analysis_content: Option<String>,
    },
    GetChatHistory {
        #[serde(default = "default_analyst")]
        analyst: String,
    },
    ClearChatHistory {
        #[serde(default = "default_analyst")]
        analyst: String,
    },
    Ping,
    GetStatus,
    Subscribe {
        #[serde(default)]
        data: Subscription,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub types: Vec<String>,
}

fn default_analyst() -> String {
    "chief".to_string()
}

impl ClientMessage {
    /// Parse one text frame
    pub fn parse(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
