//! Follow-up conversations with an analyst after its analysis
//!
//! A [`ChatStore`] belongs to one client connection and holds one
//! [`ChatSession`] per analyst. Each question is answered with the
//! analysis text and the most recent turns of the conversation in the
//! prompt.

use chrono::{DateTime, Utc};
use research_core::AnalystKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Turns included in each prompt, the current question among them
pub const HISTORY_WINDOW: usize = 15;

/// Characters of the analysis quoted in each prompt
const ANALYSIS_EXCERPT_CHARS: usize = 2000;

const NO_ANALYSIS: &str = "No written analysis is available; answer from your specialist knowledge of the company.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A question for an analyst
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub analyst: AnalystKind,
    pub message: String,
    pub ticker: String,
    pub company: String,
    /// Replaces the analysis the session discusses
    pub analysis_content: Option<String>,
}

/// Conversation with one analyst
#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    pub conversation_id: String,
    pub analyst: AnalystKind,
    pub ticker: String,
    pub company: String,
    pub analysis_content: Option<String>,
    pub messages: Vec<ChatTurn>,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    /// The last [`HISTORY_WINDOW`] turns
    pub fn recent(&self) -> &[ChatTurn] {
        let start = self.messages.len().saturating_sub(HISTORY_WINDOW);
        &self.messages[start..]
    }

    /// Prompt for answering `question` within this conversation
    pub fn prompt(&self, question: &str) -> String {
        let analysis = self
            .analysis_content
            .as_deref()
            .filter(|content| !content.trim().is_empty())
            .map(|content| content.chars().take(ANALYSIS_EXCERPT_CHARS).collect::<String>())
            .unwrap_or_else(|| NO_ANALYSIS.to_string());

        let mut history = String::new();
        for turn in self.recent() {
            let speaker = match turn.role {
                ChatRole::User => "Portfolio Manager",
                ChatRole::Assistant => self.analyst.name(),
            };
            history.push_str(&format!(
                "{speaker} ({}): {}\n\n",
                turn.timestamp.format("%Y-%m-%d"),
                turn.content
            ));
        }

        format!(
            "You are the {name} who wrote the analysis of {company} ({ticker}) below, now \
             discussing it with an experienced portfolio manager.\n\n\
             ## Your completed analysis\n{analysis}\n\n\
             ## Conversation so far\n{history}\
             ## Current question\n{question}\n\n\
             Answer directly and build on the earlier discussion. Reference specific figures \
             from your analysis and challenge the question's assumptions where the data \
             disagrees.",
            name = self.analyst.name(),
            company = self.company,
            ticker = self.ticker,
        )
    }
}

/// Chat sessions of one connection, keyed by analyst
#[derive(Debug)]
pub struct ChatStore {
    connection_id: String,
    sessions: RwLock<HashMap<AnalystKind, ChatSession>>,
}

impl ChatStore {
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// `"{connection}_{analyst}"`
    pub fn conversation_id(&self, analyst: AnalystKind) -> String {
        format!("{}_{}", self.connection_id, analyst.id())
    }

    /// Record a question, opening the session if needed, and return the
    /// session as it stands with the question appended
    ///
    /// `stored_analysis` is called with the session's ticker when neither
    /// the request nor the session carries analysis text. Empty ticker or
    /// company fields keep the session's earlier values.
    pub fn ask(
        &self,
        request: &ChatRequest,
        stored_analysis: impl FnOnce(&str) -> Option<String>,
    ) -> ChatSession {
        let conversation_id = self.conversation_id(request.analyst);
        let Ok(mut sessions) = self.sessions.write() else {
            let mut session = self.open(request, conversation_id);
            session.analysis_content = request
                .analysis_content
                .clone()
                .or_else(|| stored_analysis(&session.ticker));
            session.messages.push(ChatTurn::new(ChatRole::User, &request.message));
            return session;
        };

        let session = sessions
            .entry(request.analyst)
            .or_insert_with(|| self.open(request, conversation_id));
        if !request.ticker.trim().is_empty() {
            session.ticker = request.ticker.trim().to_ascii_uppercase();
        }
        if !request.company.trim().is_empty() {
            session.company = request.company.trim().to_string();
        }
        if let Some(content) = request.analysis_content.as_ref().filter(|c| !c.trim().is_empty()) {
            session.analysis_content = Some(content.clone());
        } else if session.analysis_content.is_none() {
            session.analysis_content = stored_analysis(&session.ticker);
        }
        session.messages.push(ChatTurn::new(ChatRole::User, &request.message));
        session.clone()
    }

    fn open(&self, request: &ChatRequest, conversation_id: String) -> ChatSession {
        debug!("Opening chat {}", conversation_id);
        ChatSession {
            conversation_id,
            analyst: request.analyst,
            ticker: request.ticker.trim().to_ascii_uppercase(),
            company: request.company.trim().to_string(),
            analysis_content: None,
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Record the analyst's reply; returns the session's message count
    pub fn answer(&self, analyst: AnalystKind, reply: &str) -> usize {
        let Ok(mut sessions) = self.sessions.write() else {
            return 0;
        };
        match sessions.get_mut(&analyst) {
            Some(session) => {
                session.messages.push(ChatTurn::new(ChatRole::Assistant, reply));
                session.messages.len()
            }
            None => 0,
        }
    }

    /// Every turn with `analyst`, oldest first
    pub fn history(&self, analyst: AnalystKind) -> Vec<ChatTurn> {
        self.sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(&analyst).map(|s| s.messages.clone()))
            .unwrap_or_default()
    }

    /// Forget the turns with `analyst`; returns how many were dropped
    ///
    /// The session keeps its analysis text.
    pub fn clear(&self, analyst: AnalystKind) -> usize {
        let Ok(mut sessions) = self.sessions.write() else {
            return 0;
        };
        sessions
            .get_mut(&analyst)
            .map(|session| session.messages.drain(..).count())
            .unwrap_or(0)
    }

    /// Open sessions
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            analyst: AnalystKind::Valuation,
            message: message.to_string(),
            ticker: "acme".to_string(),
            company: "Acme Corp".to_string(),
            analysis_content: None,
        }
    }

    #[test]
    fn test_conversation_id() {
        let store = ChatStore::new("client-1");
        assert_eq!(store.conversation_id(AnalystKind::Risk), "client-1_risk");
    }

    #[test]
    fn test_history_window() {
        let store = ChatStore::new("client-1");
        for n in 0..10 {
            store.ask(&request(&format!("question {n}")), |_| None);
            store.answer(AnalystKind::Valuation, &format!("answer {n}"));
        }
        let session = store.ask(&request("question 10"), |_| None);

        assert_eq!(session.messages.len(), 21);
        let recent = session.recent();
        assert_eq!(recent.len(), HISTORY_WINDOW);
        assert_eq!(recent[0].content, "question 3");
        assert_eq!(recent.last().unwrap().content, "question 10");

        let prompt = session.prompt("question 10");
        assert!(prompt.contains("Portfolio Manager"));
        assert!(prompt.contains("question 3\n"));
        assert!(!prompt.contains("answer 2\n"));
        assert!(prompt.contains("## Current question\nquestion 10"));
    }

    #[test]
    fn test_analysis_content_precedence() {
        let store = ChatStore::new("client-1");
        let session = store.ask(&request("first"), |_| Some("Stored: trades at 12x".into()));
        assert_eq!(session.analysis_content.as_deref(), Some("Stored: trades at 12x"));
        assert_eq!(session.ticker, "ACME");

        let mut supplied = request("second");
        supplied.analysis_content = Some("Supplied: trades at 9x".into());
        let session = store.ask(&supplied, |_| Some("Stored: trades at 12x".into()));
        assert_eq!(session.analysis_content.as_deref(), Some("Supplied: trades at 9x"));

        let session = store.ask(&request("third"), |_| Some("Stored: trades at 12x".into()));
        assert_eq!(session.analysis_content.as_deref(), Some("Supplied: trades at 9x"));
        assert!(session.prompt("third").contains("Supplied: trades at 9x"));
    }

    #[test]
    fn test_prompt_quotes_an_excerpt() {
        let store = ChatStore::new("client-1");
        let long = "x".repeat(ANALYSIS_EXCERPT_CHARS + 500);
        let session = store.ask(&request("Why?"), |_| Some(long));
        let prompt = session.prompt("Why?");
        assert!(prompt.contains(&"x".repeat(ANALYSIS_EXCERPT_CHARS)));
        assert!(!prompt.contains(&"x".repeat(ANALYSIS_EXCERPT_CHARS + 1)));

        let bare = ChatStore::new("client-2").ask(&request("Why?"), |_| None);
        assert!(bare.prompt("Why?").contains(NO_ANALYSIS));
    }

    #[test]
    fn test_clear_keeps_session() {
        let store = ChatStore::new("client-1");
        store.ask(&request("first"), |_| Some("analysis".into()));
        assert_eq!(store.answer(AnalystKind::Valuation, "reply"), 2);

        assert_eq!(store.clear(AnalystKind::Valuation), 2);
        assert!(store.history(AnalystKind::Valuation).is_empty());
        assert_eq!(store.len(), 1);

        let session = store.ask(&request("again"), |_| None);
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.analysis_content.as_deref(), Some("analysis"));

        assert_eq!(store.clear(AnalystKind::Esg), 0);
        assert!(store.history(AnalystKind::Esg).is_empty());
    }
}
