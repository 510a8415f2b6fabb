//! Core abstractions for research-rs
//!
//! This crate defines the data model shared by every other crate: the
//! immutable [`AnalysisContext`] an analysis runs against, the
//! [`AnalysisResult`] it produces, the analyst roster ([`AnalystKind`]) and the
//! tagged [`StreamMessage`] frames pushed to clients through a [`MessageSink`].

pub mod analyst;
pub mod context;
pub mod error;
pub mod message;
pub mod result;
pub mod sink;

pub use analyst::{AnalystInfo, AnalystKind};
pub use context::{AnalysisContext, AnalysisContextBuilder, DataSources, validate_ticker};
pub use error::{Error, Result};
pub use message::{ClientMessage, MessageKind, StreamMessage};
pub use result::{AnalysisResult, AnalysisStatus, calculate_quality_score};
pub use sink::{MessageSink, NullSink, RecordingSink};
