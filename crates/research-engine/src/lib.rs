//! Analysis engine for research-rs
//!
//! An [`AnalystTeam`] holds one [`StreamingAnalyst`] per persona. Each
//! analyst fetches a market snapshot, renders its persona prompt, and streams
//! the model's answer to a [`research_core::MessageSink`] through a
//! [`StreamRelay`]. Results land in [`SharedMemory`] and can be stitched into
//! an HTML slide deck with [`render_report`]. After an analysis a client can
//! keep questioning the analyst through a per-connection [`ChatStore`].
//!
//! # Example
//!
//! ```no_run
//! use research_core::{AnalysisContext, AnalystKind, NullSink};
//! use research_engine::AnalystTeam;
//! use research_llm::{KeyPool, LlmClient, RetryPolicy, providers::GeminiProvider};
//! use research_utils::Settings;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load(None)?;
//! let keys = Arc::new(KeyPool::load(&settings.keys)?);
//! let provider = Arc::new(GeminiProvider::new()?);
//! let llm = LlmClient::new(provider, keys, RetryPolicy::from(&settings.retry));
//!
//! let team = AnalystTeam::from_settings(&settings, llm)?;
//! let context = AnalysisContext::builder("Apple Inc.", "AAPL").build()?;
//! let result = team
//!     .conduct_analysis(AnalystKind::Fundamentals, &context, Arc::new(NullSink))
//!     .await?;
//! println!("quality {:.2}", result.quality_score);
//! # Ok(())
//! # }
//! ```

pub mod analyst;
pub mod chat;
pub mod error;
pub mod memory;
pub mod relay;
pub mod report;
pub mod team;

pub use analyst::{AnalystConfig, PerformanceStats, StreamingAnalyst};
pub use chat::{ChatRequest, ChatRole, ChatSession, ChatStore, ChatTurn, HISTORY_WINDOW};
pub use error::{EngineError, Result};
pub use memory::{MemoryEntry, MemoryStats, SharedMemory};
pub use relay::StreamRelay;
pub use report::{escape_html, markdown_to_html, render_report};
pub use team::{AnalystTeam, AnalystTeamBuilder, ChatReply, ReportOutcome};
