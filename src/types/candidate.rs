//! Candidate records: the normalized startup profile that flows through every stage.

use serde::{Deserialize, Serialize};

use crate::types::{CandidateId, FundingAsk, JobId};

/// Free-form context that does not map to a first-class field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateMetadata {
    pub team: Vec<String>,
    pub traction: Option<String>,
    pub claims: Vec<String>,
}

/// Extraction-stage fields. Absent evidence stays `None` or empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateProfile {
    pub name: String,
    pub sector: Option<String>,
    pub stage: Option<String>,
    pub geography: Option<String>,
    pub funding_ask: FundingAsk,
    pub summary: Option<String>,
    pub product: Option<String>,
    pub website: Option<String>,
    pub metadata: CandidateMetadata,
}

impl CandidateProfile {
    /// A profile without a name is not a valid candidate.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Overlay `self` (document-derived) on `fallback` (row-derived).
    ///
    /// Fields present in `self` win; `fallback` fills the gaps.
    pub fn merged_over(self, fallback: CandidateProfile) -> CandidateProfile {
        fn pick(primary: Option<String>, secondary: Option<String>) -> Option<String> {
            primary.or(secondary)
        }
        fn pick_list(primary: Vec<String>, secondary: Vec<String>) -> Vec<String> {
            if primary.is_empty() { secondary } else { primary }
        }

        CandidateProfile {
            name: if self.is_valid() {
                self.name
            } else {
                fallback.name
            },
            sector: pick(self.sector, fallback.sector),
            stage: pick(self.stage, fallback.stage),
            geography: pick(self.geography, fallback.geography),
            funding_ask: FundingAsk {
                min: self.funding_ask.min.or(fallback.funding_ask.min),
                max: if self.funding_ask.is_empty() {
                    fallback.funding_ask.max
                } else {
                    self.funding_ask.max
                },
            },
            summary: pick(self.summary, fallback.summary),
            product: pick(self.product, fallback.product),
            website: pick(self.website, fallback.website),
            metadata: CandidateMetadata {
                team: pick_list(self.metadata.team, fallback.metadata.team),
                traction: pick(self.metadata.traction, fallback.metadata.traction),
                claims: pick_list(self.metadata.claims, fallback.metadata.claims),
            },
        }
    }
}

/// Filtering-stage annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceScore {
    /// 0.0..=1.0
    pub score: f64,
    pub rationale: String,
    #[serde(default)]
    pub matches: Vec<String>,
    #[serde(default)]
    pub mismatches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default)]
    pub id: CandidateId,
    pub job_id: JobId,
    pub source_unit_id: Option<String>,
    /// First-seen order across the job, final ranking tie-breaker
    pub extraction_order: u32,
    pub profile: CandidateProfile,
    /// Attached during filtering; earlier fields are never rewritten
    #[serde(default)]
    pub relevance: Option<RelevanceScore>,
}

impl CandidateRecord {
    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn relevance_score(&self) -> Option<f64> {
        self.relevance.as_ref().map(|r| r.score)
    }

    pub fn relevance_rationale(&self) -> Option<&str> {
        self.relevance.as_ref().map(|r| r.rationale.as_str())
    }

    /// Compact multi-line profile used in evaluator prompts.
    pub fn profile_block(&self) -> String {
        let p = &self.profile;
        let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "Unknown".to_string());
        let mut lines = vec![
            format!("Company: {}", p.name),
            format!("Sector: {}", or_unknown(&p.sector)),
            format!("Stage: {}", or_unknown(&p.stage)),
            format!("Geography: {}", or_unknown(&p.geography)),
            format!("Funding ask: {}", p.funding_ask.display()),
            format!("Summary: {}", or_unknown(&p.summary)),
            format!("Product: {}", or_unknown(&p.product)),
        ];
        if !p.metadata.team.is_empty() {
            lines.push(format!("Team: {}", p.metadata.team.join("; ")));
        }
        if let Some(traction) = &p.metadata.traction {
            lines.push(format!("Traction: {}", traction));
        }
        if !p.metadata.claims.is_empty() {
            lines.push("Claims:".to_string());
            lines.extend(p.metadata.claims.iter().map(|c| format!("- {}", c)));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> CandidateProfile {
        CandidateProfile {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_nameless_profile_is_invalid() {
        assert!(!profile("  ").is_valid());
        assert!(profile("Acme").is_valid());
    }

    #[test]
    fn test_document_fields_win_and_row_fills_gaps() {
        let doc = CandidateProfile {
            name: "Acme AI".to_string(),
            sector: Some("AI".to_string()),
            metadata: CandidateMetadata {
                claims: vec!["10x faster".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        let row = CandidateProfile {
            name: "Acme".to_string(),
            sector: Some("Software".to_string()),
            geography: Some("Berlin".to_string()),
            funding_ask: FundingAsk::exact(1500.0),
            website: Some("https://acme.example".to_string()),
            ..Default::default()
        };

        let merged = doc.merged_over(row);
        assert_eq!(merged.name, "Acme AI");
        assert_eq!(merged.sector.as_deref(), Some("AI"));
        assert_eq!(merged.geography.as_deref(), Some("Berlin"));
        assert_eq!(merged.funding_ask, FundingAsk::exact(1500.0));
        assert_eq!(merged.website.as_deref(), Some("https://acme.example"));
        assert_eq!(merged.metadata.claims, vec!["10x faster"]);
    }

    #[test]
    fn test_row_name_used_when_document_has_none() {
        let merged = profile("").merged_over(profile("RowCo"));
        assert_eq!(merged.name, "RowCo");
    }

    #[test]
    fn test_profile_block_lists_claims() {
        let record = CandidateRecord {
            id: CandidateId::new("c1"),
            job_id: JobId::new("j1"),
            source_unit_id: None,
            extraction_order: 0,
            profile: CandidateProfile {
                name: "Acme".to_string(),
                metadata: CandidateMetadata {
                    claims: vec!["Patent pending".to_string()],
                    ..Default::default()
                },
                ..Default::default()
            },
            relevance: None,
        };
        let block = record.profile_block();
        assert!(block.contains("Company: Acme"));
        assert!(block.contains("Sector: Unknown"));
        assert!(block.contains("- Patent pending"));
        assert_eq!(record.relevance_score(), None);
    }
}
