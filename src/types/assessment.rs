//! Deep-analysis output types
//!
//! Three fragments (technical, market, risk) are produced per shortlisted
//! candidate. An [`Assessment`] only exists when all three are present and
//! consistent; it is written once and never patched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{CandidateId, JobId, Result, SiftError};

// =============================================================================
// Technical Fragment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimVerdict {
    Feasible,
    Questionable,
    Unlikely,
}

impl ClaimVerdict {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feasible" | "plausible" | "validated" => Some(Self::Feasible),
            "questionable" | "uncertain" => Some(Self::Questionable),
            "unlikely" | "infeasible" | "implausible" => Some(Self::Unlikely),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimCheck {
    pub claim: String,
    pub verdict: ClaimVerdict,
    pub reasoning: String,
    #[serde(default)]
    pub evidence: Option<String>,
    #[serde(default)]
    pub risk_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalAssessment {
    pub overall_assessment: String,
    pub claims: Vec<ClaimCheck>,
    pub technical_risks: Vec<String>,
    /// 0..=100
    pub technical_score: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub scalability: Option<String>,
    pub team_depth: Option<String>,
    pub competitive_moat: Option<String>,
}

// =============================================================================
// Market Fragment
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSizing {
    pub tam: Option<String>,
    pub sam: Option<String>,
    pub som: Option<String>,
    pub growth_rate: Option<String>,
    pub trends: Vec<String>,
    pub maturity: Option<String>,
    pub timing: Option<String>,
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorMap {
    pub direct: Vec<String>,
    pub indirect: Vec<String>,
    pub advantages: Vec<String>,
    pub disadvantages: Vec<String>,
    pub position: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialCheck {
    pub revenue_potential: Option<String>,
    pub revenue_model: Option<String>,
    pub unit_economics: Option<String>,
    pub burn_rate: Option<String>,
    pub path_to_profitability: Option<String>,
    pub capital_efficiency: Option<String>,
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAssessment {
    pub sizing: MarketSizing,
    pub competitors: CompetitorMap,
    pub financials: FinancialCheck,
    /// 0..=100
    pub market_score: f64,
    pub key_insight: Option<String>,
}

// =============================================================================
// Risk Fragment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Green,
    Yellow,
    Red,
}

impl RiskLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" | "low" => Some(Self::Green),
            "yellow" | "amber" | "medium" => Some(Self::Yellow),
            "red" | "high" => Some(Self::Red),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

/// Risk level per dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskHeatmap {
    pub team: RiskLevel,
    pub market: RiskLevel,
    pub tech: RiskLevel,
    pub financial: RiskLevel,
    pub execution: RiskLevel,
}

impl RiskHeatmap {
    pub const DIMENSIONS: [&'static str; 5] = ["team", "market", "tech", "financial", "execution"];

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, RiskLevel)> {
        Self::DIMENSIONS.into_iter().zip([
            self.team,
            self.market,
            self.tech,
            self.financial,
            self.execution,
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueProjection {
    pub year1: Option<f64>,
    pub year2: Option<f64>,
    pub year3: Option<f64>,
    pub currency: String,
    pub methodology: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    Pass,
}

impl Recommendation {
    pub fn parse(s: &str) -> Option<Self> {
        match s
            .trim()
            .to_ascii_lowercase()
            .replace([' ', '-'], "_")
            .as_str()
        {
            "strong_buy" => Some(Self::StrongBuy),
            "buy" => Some(Self::Buy),
            "hold" => Some(Self::Hold),
            "pass" => Some(Self::Pass),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongBuy => "strong_buy",
            Self::Buy => "buy",
            Self::Hold => "hold",
            Self::Pass => "pass",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub heatmap: RiskHeatmap,
    /// 0..=100
    pub success_probability: f64,
    /// 0..=100
    pub competition_difficulty: f64,
    pub revenue_projection: RevenueProjection,
    pub profit_margin: Option<String>,
    /// Ranked, most important first
    pub key_points: Vec<String>,
    pub summary: String,
    pub detailed_analysis: Option<String>,
    pub recommendation: Recommendation,
}

// =============================================================================
// Assessment
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(default)]
    pub id: String,
    pub job_id: JobId,
    pub candidate_id: CandidateId,
    pub technical: TechnicalAssessment,
    pub market: MarketAssessment,
    pub risk: RiskAssessment,
    pub created_at: DateTime<Utc>,
}

fn check_percent(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(SiftError::Evaluation {
            evaluator: "assessment".to_string(),
            candidate: String::new(),
            message: format!("{} out of range: {}", field, value),
            raw: None,
        })
    }
}

impl TechnicalAssessment {
    pub fn validate(&self) -> Result<()> {
        check_percent("technical_score", self.technical_score)
    }
}

impl MarketAssessment {
    pub fn validate(&self) -> Result<()> {
        check_percent("market_score", self.market_score)
    }
}

impl RiskAssessment {
    pub fn validate(&self) -> Result<()> {
        check_percent("success_probability", self.success_probability)?;
        check_percent("competition_difficulty", self.competition_difficulty)?;
        if self.summary.trim().is_empty() {
            return Err(SiftError::Evaluation {
                evaluator: "risk".to_string(),
                candidate: String::new(),
                message: "empty overall summary".to_string(),
                raw: None,
            });
        }
        Ok(())
    }
}

impl Assessment {
    /// Assemble an assessment, rejecting inconsistent fragments.
    pub fn assemble(
        job_id: JobId,
        candidate_id: CandidateId,
        technical: TechnicalAssessment,
        market: MarketAssessment,
        risk: RiskAssessment,
    ) -> Result<Self> {
        technical.validate()?;
        market.validate()?;
        risk.validate()?;
        Ok(Self {
            id: String::new(),
            job_id,
            candidate_id,
            technical,
            market,
            risk,
            created_at: Utc::now(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_assemble_accepts_consistent_fragments() {
        let a = Assessment::assemble(
            JobId::new("j"),
            CandidateId::new("c"),
            technical(70.0),
            market(60.0),
            risk(72.0),
        )
        .unwrap();
        assert_eq!(a.risk.recommendation, Recommendation::Buy);
    }

    #[test]
    fn test_assemble_rejects_out_of_range_probability() {
        let err = Assessment::assemble(
            JobId::new("j"),
            CandidateId::new("c"),
            technical(70.0),
            market(60.0),
            risk(140.0),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "EvaluationError");
    }

    #[test]
    fn test_enum_parsers_are_lenient() {
        assert_eq!(Recommendation::parse("Strong Buy"), Some(Recommendation::StrongBuy));
        assert_eq!(Recommendation::parse("strong-buy"), Some(Recommendation::StrongBuy));
        assert_eq!(Recommendation::parse("maybe"), None);
        assert_eq!(RiskLevel::parse("Amber"), Some(RiskLevel::Yellow));
        assert_eq!(ClaimVerdict::parse("FEASIBLE"), Some(ClaimVerdict::Feasible));
    }

    #[test]
    fn test_heatmap_iterates_all_dimensions() {
        let dims: Vec<_> = risk(50.0).heatmap.iter().map(|(d, _)| d).collect();
        assert_eq!(dims, RiskHeatmap::DIMENSIONS);
    }
}
