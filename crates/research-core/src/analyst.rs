//! Analyst roster
//!
//! Each analyst kind maps to one persona prompt and one slide in the
//! comprehensive report.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The simulated analyst roles that can run an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalystKind {
    Chief,
    Fundamentals,
    Industry,
    Technical,
    Risk,
    Esg,
    Research,
    Sentiment,
    Management,
    Business,
    Valuation,
    Macro,
}

impl AnalystKind {
    /// Every analyst, in report order
    pub const ALL: [Self; 12] = [
        Self::Chief,
        Self::Fundamentals,
        Self::Industry,
        Self::Technical,
        Self::Risk,
        Self::Esg,
        Self::Research,
        Self::Sentiment,
        Self::Management,
        Self::Business,
        Self::Valuation,
        Self::Macro,
    ];

    /// Stable identifier used on the wire and as the template id
    pub fn id(self) -> &'static str {
        match self {
            Self::Chief => "chief",
            Self::Fundamentals => "fundamentals",
            Self::Industry => "industry",
            Self::Technical => "technical",
            Self::Risk => "risk",
            Self::Esg => "esg",
            Self::Research => "research",
            Self::Sentiment => "sentiment",
            Self::Management => "management",
            Self::Business => "business",
            Self::Valuation => "valuation",
            Self::Macro => "macro",
        }
    }

    /// Display name of the persona
    pub fn name(self) -> &'static str {
        match self {
            Self::Chief => "Chief Investment Officer",
            Self::Fundamentals => "Senior Fundamental Research Analyst",
            Self::Industry => "Senior Industry Research Analyst",
            Self::Technical => "Senior Technical Research Analyst",
            Self::Risk => "Senior Risk Management Analyst",
            Self::Esg => "Senior ESG Research Analyst",
            Self::Research => "Senior Third-Party Research Analyst",
            Self::Sentiment => "Senior News & Sentiment Analyst",
            Self::Management => "Senior Management & Governance Analyst",
            Self::Business => "Senior Business Model Analyst",
            Self::Valuation => "Senior Valuation & Modeling Analyst",
            Self::Macro => "Senior Macro & Cyclical Analyst",
        }
    }

    pub fn specialty(self) -> &'static str {
        match self {
            Self::Chief => "Strategic Investment Decision-Making & Multi-Asset Portfolio Management",
            Self::Fundamentals => "Financial Analysis & Advanced Valuation Modeling",
            Self::Industry => "Sector Intelligence & Competitive Dynamics",
            Self::Technical => "Technical Analysis & Systematic Trading Strategies",
            Self::Risk => "Risk Assessment & Advanced Scenario Modeling",
            Self::Esg => "ESG Analysis & Sustainable Investment Strategy",
            Self::Research => "Research Synthesis & Consensus Analysis",
            Self::Sentiment => "Market Sentiment & News Analysis",
            Self::Management => "Management Assessment & Corporate Governance",
            Self::Business => "Business Model & Economic Moat Analysis",
            Self::Valuation => "Valuation Modeling & Quantitative Analysis",
            Self::Macro => "Macroeconomic & Cyclical Analysis",
        }
    }

    pub fn focus_areas(self) -> &'static [&'static str] {
        match self {
            Self::Chief => &[
                "Macro-Strategic Asset Allocation",
                "Alpha Generation",
                "Risk-Adjusted Returns",
                "Multi-Factor Portfolio Construction",
            ],
            Self::Fundamentals => &[
                "Advanced DCF Modeling",
                "Earnings Quality",
                "Capital Allocation",
                "Competitive Moats",
            ],
            Self::Industry => &[
                "Industry Disruption",
                "Competitive Advantage",
                "Market Structure",
                "Regulatory Impact",
            ],
            Self::Technical => &[
                "Chart Patterns",
                "Multi-Timeframe Analysis",
                "Options Flow",
                "Market Microstructure",
            ],
            Self::Risk => &[
                "Value-at-Risk",
                "Stress Testing",
                "Tail Risk",
                "Correlation Breakdown",
            ],
            Self::Esg => &[
                "ESG Scoring",
                "Climate Risk",
                "Governance Quality",
                "Stakeholder Capitalism",
            ],
            Self::Research => &[
                "Sell-Side Synthesis",
                "Analyst Consensus",
                "Institutional Positioning",
                "Contrarian Analysis",
            ],
            Self::Sentiment => &[
                "News Flow",
                "Market Sentiment",
                "Social Media",
                "Management Communication",
            ],
            Self::Management => &[
                "Management Evaluation",
                "Governance Structure",
                "Capital Allocation",
                "Strategic Execution",
            ],
            Self::Business => &[
                "Business Model",
                "Economic Moats",
                "Competitive Advantage",
                "Customer Value",
            ],
            Self::Valuation => &[
                "DCF Construction",
                "Relative Valuation",
                "Sum-of-Parts",
                "Sensitivity Analysis",
            ],
            Self::Macro => &[
                "Macro Environment",
                "Industry Cyclical",
                "Policy Impact",
                "Currency Sensitivity",
            ],
        }
    }

    /// Agent id used in results and stream frames
    pub fn agent_id(self) -> String {
        format!("streaming_{}_analyst", self.id())
    }

    pub fn info(self) -> AnalystInfo {
        AnalystInfo {
            id: self.id().to_string(),
            name: self.name().to_string(),
            specialty: self.specialty().to_string(),
            focus_areas: self.focus_areas().iter().map(ToString::to_string).collect(),
        }
    }
}

impl fmt::Display for AnalystKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AnalystKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == needle)
            .ok_or_else(|| Error::UnknownAnalyst(s.to_string()))
    }
}

/// Roster entry returned by the analysts listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalystInfo {
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub focus_areas: Vec<String>,
}
