//! In-process store of analysis results shared between analysts

use chrono::{DateTime, Utc};
use research_core::AnalysisResult;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// One stored result
#[derive(Debug, Clone, Serialize)]
pub struct MemoryEntry {
    pub ticker: String,
    pub agent_id: String,
    pub quality_score: f64,
    pub stored_at: DateTime<Utc>,
    pub result: AnalysisResult,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MemoryStats {
    pub entries: usize,
    pub average_quality: f64,
}

/// Results keyed by `"{ticker}:{agent_id}"`
///
/// A later result for the same ticker and analyst replaces the earlier one.
#[derive(Debug, Default)]
pub struct SharedMemory {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl SharedMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(ticker: &str, agent_id: &str) -> String {
        format!("{}:{agent_id}", ticker.to_uppercase())
    }

    pub fn store(&self, ticker: &str, result: AnalysisResult) {
        let key = Self::key(ticker, &result.agent_id);
        let entry = MemoryEntry {
            ticker: ticker.to_uppercase(),
            agent_id: result.agent_id.clone(),
            quality_score: result.quality_score,
            stored_at: Utc::now(),
            result,
        };
        if let Ok(mut entries) = self.entries.write() {
            debug!("Stored {} (quality {:.2})", key, entry.quality_score);
            entries.insert(key, entry);
        }
    }

    pub fn get(&self, ticker: &str, agent_id: &str) -> Option<MemoryEntry> {
        if let Ok(entries) = self.entries.read() {
            entries.get(&Self::key(ticker, agent_id)).cloned()
        } else {
            None
        }
    }

    /// Every result stored for a ticker, oldest first
    pub fn for_ticker(&self, ticker: &str) -> Vec<MemoryEntry> {
        let ticker = ticker.to_uppercase();
        let mut found: Vec<MemoryEntry> = if let Ok(entries) = self.entries.read() {
            entries
                .values()
                .filter(|entry| entry.ticker == ticker)
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        found.sort_by_key(|entry| entry.stored_at);
        found
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn stats(&self) -> MemoryStats {
        let Ok(entries) = self.entries.read() else {
            return MemoryStats::default();
        };
        if entries.is_empty() {
            return MemoryStats::default();
        }
        let total: f64 = entries.values().map(|entry| entry.quality_score).sum();
        MemoryStats {
            entries: entries.len(),
            average_quality: total / entries.len() as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::AnalystKind;
    use serde_json::{Map, json};

    fn result(kind: AnalystKind, quality: f64) -> AnalysisResult {
        let mut data = Map::new();
        data.insert("streaming_analysis".into(), json!("text"));
        AnalysisResult::completed(kind, data, 1.0).with_quality(quality)
    }

    #[test]
    fn test_store_and_get() {
        let memory = SharedMemory::new();
        memory.store("acme", result(AnalystKind::Risk, 0.8));

        let entry = memory.get("ACME", "streaming_risk_analyst").unwrap();
        assert_eq!(entry.ticker, "ACME");
        assert!((entry.quality_score - 0.8).abs() < f64::EPSILON);
        assert!(memory.get("ACME", "streaming_esg_analyst").is_none());
    }

    #[test]
    fn test_same_key_replaces() {
        let memory = SharedMemory::new();
        memory.store("ACME", result(AnalystKind::Risk, 0.4));
        memory.store("ACME", result(AnalystKind::Risk, 0.9));
        assert_eq!(memory.len(), 1);
        assert!((memory.get("ACME", "streaming_risk_analyst").unwrap().quality_score - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats() {
        let memory = SharedMemory::new();
        assert_eq!(memory.stats(), MemoryStats::default());

        memory.store("ACME", result(AnalystKind::Risk, 0.6));
        memory.store("ACME", result(AnalystKind::Esg, 0.8));
        memory.store("INIT", result(AnalystKind::Risk, 1.0));

        let stats = memory.stats();
        assert_eq!(stats.entries, 3);
        assert!((stats.average_quality - 0.8).abs() < 1e-9);
        assert_eq!(memory.for_ticker("acme").len(), 2);

        memory.clear();
        assert!(memory.is_empty());
    }
}
