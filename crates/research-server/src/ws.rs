//! WebSocket sessions on `/ws/professional`
//!
//! One connection is one session. A writer task drains the session's
//! [`ChannelSink`] into the socket; analyses run as spawned tasks holding a
//! clone of the sink. When the client leaves, the writer stops and any
//! analysis still running finishes with its sends failing. Chat sessions
//! with analysts live as long as the connection.

use crate::sink::ChannelSink;
use crate::state::{SharedState, parse_analysts, request_context};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use research_core::{AnalystKind, ClientMessage, MessageKind, MessageSink, StreamMessage};
use research_engine::{ChatRequest, ChatStore};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const CAPABILITIES: &[&str] = &[
    "real_time_streaming",
    "professional_analysis",
    "institutional_reports",
    "websocket_support",
];

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    ws.on_upgrade(move |socket| session(socket, state))
}

async fn session(socket: WebSocket, state: SharedState) {
    let _guard = state.connection_guard();
    let client_id = Uuid::new_v4().to_string();
    info!("WebSocket connected: {}", client_id);

    let (mut outgoing, mut incoming) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<StreamMessage>();

    let writer_id = client_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize {:?} frame: {}", message.kind, e);
                    continue;
                }
            };
            if let Err(e) = outgoing.send(Message::Text(text)).await {
                debug!("Writer for {} stopped: {}", writer_id, e);
                break;
            }
        }
    });

    let sink = Arc::new(ChannelSink::new(tx, &client_id));
    let chats = Arc::new(ChatStore::new(&client_id));
    let _ = sink
        .send(StreamMessage::connection_established(&client_id, CAPABILITIES))
        .await;

    while let Some(frame) = incoming.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_text(&state, &sink, &chats, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error for {}: {}", client_id, e);
                break;
            }
        }
    }

    writer.abort();
    info!(
        "WebSocket disconnected: {} ({} chat sessions dropped)",
        client_id,
        chats.len()
    );
}

async fn handle_text(
    state: &SharedState,
    sink: &Arc<ChannelSink>,
    chats: &Arc<ChatStore>,
    text: &str,
) {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            match serde_json::from_str::<Value>(text) {
                Ok(value) => warn!(
                    "Unknown message type {} from {}: {}",
                    value.get("type").unwrap_or(&serde_json::Value::Null),
                    sink.client_id(),
                    e
                ),
                Err(_) => warn!("Invalid JSON from {}: {}", sink.client_id(), e),
            }
            return;
        }
    };
    handle_message(state, sink.clone(), chats, message).await;
}

async fn handle_message(
    state: &SharedState,
    sink: Arc<ChannelSink>,
    chats: &Arc<ChatStore>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::StartAnalysis {
            analyst,
            ticker,
            company,
            user_query,
            sources,
        } => {
            let prepared = analyst.parse::<AnalystKind>().and_then(|kind| {
                request_context(&company, &ticker, Some(kind), user_query.as_deref(), sources)
                    .map(|context| (kind, context))
            });
            let (kind, context) = match prepared {
                Ok(prepared) => prepared,
                Err(e) => {
                    let _ = sink.send(StreamMessage::analysis_error(&analyst, e)).await;
                    return;
                }
            };

            let team = state.team.clone();
            tokio::spawn(async move {
                if let Err(e) = team.conduct_analysis(kind, &context, sink.clone()).await {
                    let _ = sink.send(StreamMessage::analysis_error(kind.id(), e)).await;
                }
            });
        }
        ClientMessage::GenerateReport {
            ticker,
            company,
            analysts,
            sources,
        } => {
            let prepared = parse_analysts(analysts.as_deref()).and_then(|kinds| {
                request_context(&company, &ticker, None, None, sources)
                    .map(|context| (kinds, context))
            });
            let (kinds, context) = match prepared {
                Ok(prepared) => prepared,
                Err(e) => {
                    let _ = sink.send(bulk_error(&ticker, &e)).await;
                    return;
                }
            };

            let team = state.team.clone();
            tokio::spawn(async move {
                if let Err(e) = team.generate_report(&context, &kinds, sink.clone()).await {
                    let _ = sink.send(bulk_error(context.ticker(), &e)).await;
                }
            });
        }
        ClientMessage::ChatMessage {
            analyst,
            message,
            ticker,
            company,
            analysis_content,
        } => {
            let kind = match analyst.parse::<AnalystKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    let _ = sink.send(chat_error(&analyst, &e)).await;
                    return;
                }
            };
            if message.trim().is_empty() {
                let _ = sink.send(chat_error(kind.id(), &"message is empty")).await;
                return;
            }

            let request = ChatRequest {
                analyst: kind,
                message,
                ticker,
                company,
                analysis_content,
            };
            let team = state.team.clone();
            let chats = chats.clone();
            tokio::spawn(async move {
                if let Err(e) = team.chat(&chats, request, sink.clone()).await {
                    warn!("Chat with {} failed: {}", kind.id(), e);
                    let _ = sink.send(chat_error(kind.id(), &e)).await;
                }
            });
        }
        ClientMessage::GetChatHistory { analyst } => {
            let frame = match analyst.parse::<AnalystKind>() {
                Ok(kind) => StreamMessage::new(
                    MessageKind::ChatHistory,
                    json!({
                        "analyst": kind.id(),
                        "messages": chats.history(kind),
                        "conversation_id": chats.conversation_id(kind),
                    }),
                ),
                Err(e) => chat_error(&analyst, &e),
            };
            let _ = sink.send(frame).await;
        }
        ClientMessage::ClearChatHistory { analyst } => {
            let frame = match analyst.parse::<AnalystKind>() {
                Ok(kind) => {
                    let cleared = chats.clear(kind);
                    debug!("Cleared {} chat turns with {}", cleared, kind.id());
                    StreamMessage::new(
                        MessageKind::ChatHistoryCleared,
                        json!({ "analyst": kind.id(), "cleared": cleared }),
                    )
                }
                Err(e) => chat_error(&analyst, &e),
            };
            let _ = sink.send(frame).await;
        }
        ClientMessage::Ping => {
            let _ = sink.send(StreamMessage::pong()).await;
        }
        ClientMessage::GetStatus => {
            let _ = sink.send(system_status(state)).await;
        }
        ClientMessage::Subscribe { data } => {
            let kinds = sink.subscribe(&data.types);
            debug!("{} subscribed to {:?}", sink.client_id(), kinds);
        }
    }
}

fn bulk_error(ticker: &str, error: &dyn std::fmt::Display) -> StreamMessage {
    StreamMessage::new(
        MessageKind::BulkAnalysisError,
        json!({ "ticker": ticker, "error": error.to_string() }),
    )
}

fn chat_error(analyst: &str, error: &dyn std::fmt::Display) -> StreamMessage {
    StreamMessage::new(
        MessageKind::ChatError,
        json!({ "analyst": analyst, "error": format!("Chat failed: {error}") }),
    )
}

fn system_status(state: &SharedState) -> StreamMessage {
    let memory = state.team.memory().stats();
    let analysts: Vec<Value> = state
        .team
        .stats()
        .into_iter()
        .map(|(kind, stats)| {
            json!({
                "id": kind.id(),
                "executions": stats.executions,
                "success_rate": stats.success_rate(),
            })
        })
        .collect();
    StreamMessage::new(
        MessageKind::SystemStatus,
        json!({
            "active_connections": state.active_connections(),
            "uptime_secs": state.uptime_secs(),
            "keys": state.keys.stats(),
            "stored_results": memory.entries,
            "average_quality": memory.average_quality,
            "analysts": analysts,
        }),
    )
}
