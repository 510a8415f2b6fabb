//! Analysis result types

use crate::AnalystKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle of one analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Outcome of one analyst run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub agent_id: String,
    pub analyst: AnalystKind,
    pub data: Map<String, Value>,
    /// 0.0 ..= 1.0
    pub quality_score: f64,
    /// Wall-clock seconds
    pub processing_time: f64,
    pub timestamp: DateTime<Utc>,
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub data_sources: Vec<String>,
}

impl AnalysisResult {
    /// A completed result; the quality score is derived from `data`
    pub fn completed(analyst: AnalystKind, data: Map<String, Value>, processing_time: f64) -> Self {
        let quality_score = calculate_quality_score(&data);
        Self {
            agent_id: analyst.agent_id(),
            analyst,
            data,
            quality_score,
            processing_time,
            timestamp: Utc::now(),
            status: AnalysisStatus::Completed,
            error_message: None,
            data_sources: Vec::new(),
        }
    }

    /// A failed result with zero quality
    pub fn failed(analyst: AnalystKind, error: impl Into<String>, processing_time: f64) -> Self {
        Self {
            agent_id: analyst.agent_id(),
            analyst,
            data: Map::new(),
            quality_score: 0.0,
            processing_time,
            timestamp: Utc::now(),
            status: AnalysisStatus::Failed,
            error_message: Some(error.into()),
            data_sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = String>) -> Self {
        for source in sources {
            if !self.data_sources.contains(&source) {
                self.data_sources.push(source);
            }
        }
        self
    }

    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality_score = quality.clamp(0.0, 1.0);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == AnalysisStatus::Completed
    }

    /// The streamed analysis text, when present
    pub fn content(&self) -> Option<&str> {
        self.data.get("streaming_analysis").and_then(Value::as_str)
    }
}

const COMPLETENESS_WEIGHT: f64 = 0.4;
const ACCURACY_WEIGHT: f64 = 0.3;
const TIMELINESS_WEIGHT: f64 = 0.2;
const CONSISTENCY_WEIGHT: f64 = 0.1;

/// Keys whose numeric values must never be negative
const NON_NEGATIVE_KEYS: [&str; 3] = ["price", "market_cap", "revenue"];

/// Heuristic quality score of a result payload
///
/// Weighted blend of completeness (share of non-empty values), accuracy
/// (numeric values finite, money-like fields non-negative), timeliness and
/// consistency. An empty payload scores 0.
pub fn calculate_quality_score(data: &Map<String, Value>) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let filled = data.values().filter(|v| !is_empty_value(v)).count();
    let completeness = filled as f64 / data.len() as f64;

    let mut numeric = 0usize;
    let mut valid = 0usize;
    for (key, value) in data {
        if let Some(n) = value.as_f64() {
            numeric += 1;
            let key = key.to_ascii_lowercase();
            let money_like = NON_NEGATIVE_KEYS.iter().any(|k| key.contains(k));
            if n.is_finite() && !(money_like && n < 0.0) {
                valid += 1;
            }
        }
    }
    let accuracy = if numeric == 0 {
        1.0
    } else {
        valid as f64 / numeric as f64
    };

    let score = completeness * COMPLETENESS_WEIGHT
        + accuracy * ACCURACY_WEIGHT
        + TIMELINESS_WEIGHT
        + CONSISTENCY_WEIGHT;
    score.clamp(0.0, 1.0)
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_quality_empty() {
        assert_eq!(calculate_quality_score(&Map::new()), 0.0);
    }

    #[test]
    fn test_quality_complete_payload() {
        let data = map(json!({"analysis": "text", "price": 10.5, "source_count": 3}));
        let score = calculate_quality_score(&data);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_quality_penalises_gaps_and_bad_numbers() {
        let data = map(json!({"analysis": "", "price": -3.0}));
        // completeness 0.5, accuracy 0.0
        let score = calculate_quality_score(&data);
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_failed_result() {
        let result = AnalysisResult::failed(AnalystKind::Risk, "quota exhausted", 1.25);
        assert_eq!(result.status, AnalysisStatus::Failed);
        assert_eq!(result.quality_score, 0.0);
        assert_eq!(result.error_message.as_deref(), Some("quota exhausted"));
        assert_eq!(result.agent_id, "streaming_risk_analyst");
        assert!(!result.is_success());
    }

    #[test]
    fn test_completed_result_serialization() {
        let data = map(json!({"streaming_analysis": "Buy."}));
        let result = AnalysisResult::completed(AnalystKind::Chief, data, 2.0)
            .with_sources(vec!["https://a.test".to_string(), "https://a.test".to_string()]);

        assert_eq!(result.content(), Some("Buy."));
        assert_eq!(result.data_sources.len(), 1);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["analyst"], "chief");
        assert!(json.get("error_message").is_none());
    }
}
