//! Risk analysis data structures

use crate::config::ActionMode;
use crate::error::ClassifiedError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Prefix of the risk factor that marks a synthetic fallback analysis
pub const FALLBACK_FACTOR_PREFIX: &str = "fallback due to error: ";

/// Score given to fallback analyses
pub const FALLBACK_SCORE: f64 = 0.5;

/// Closed set of recommended actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    Allow,
    Review,
    Block,
}

impl RecommendedAction {
    /// Bucket a score: [0, 0.3) allow, [0.3, 0.7) review, [0.7, 1.0] block
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            RecommendedAction::Block
        } else if score >= 0.3 {
            RecommendedAction::Review
        } else {
            RecommendedAction::Allow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::Allow => "allow",
            RecommendedAction::Review => "review",
            RecommendedAction::Block => "block",
        }
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendedAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(RecommendedAction::Allow),
            "review" => Ok(RecommendedAction::Review),
            "block" => Ok(RecommendedAction::Block),
            other => Err(format!("unknown recommended action {other:?}")),
        }
    }
}

/// Structured risk opinion produced for one transaction.
///
/// Only the schema validator and the fallback path construct values, so a
/// `RiskAnalysis` always satisfies the score bound and carries non-empty
/// reasoning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAnalysis {
    risk_score: f64,
    risk_factors: Vec<String>,
    reasoning: String,
    recommended_action: String,
    #[serde(skip)]
    degraded: bool,
}

impl RiskAnalysis {
    /// Assemble an already-validated analysis
    pub(crate) fn from_validated(
        risk_score: f64,
        risk_factors: Vec<String>,
        reasoning: String,
        recommended_action: String,
    ) -> Self {
        debug_assert!((0.0..=1.0).contains(&risk_score));
        debug_assert!(!reasoning.trim().is_empty());
        Self {
            risk_score,
            risk_factors,
            reasoning,
            recommended_action,
            degraded: false,
        }
    }

    /// Synthetic mid-point analysis that stands in for a failed one
    pub fn fallback(cause: &ClassifiedError, action_mode: ActionMode) -> Self {
        let recommended_action = match action_mode {
            ActionMode::FreeText => "Please review manually.".to_string(),
            ActionMode::Enumerated | ActionMode::Bucketed => {
                RecommendedAction::Review.as_str().to_string()
            }
        };

        Self {
            risk_score: FALLBACK_SCORE,
            risk_factors: vec![format!(
                "{FALLBACK_FACTOR_PREFIX}{}: {}",
                cause.kind(),
                cause.message()
            )],
            reasoning: "Default analysis because of an external error.".to_string(),
            recommended_action,
            degraded: true,
        }
    }

    pub fn risk_score(&self) -> f64 {
        self.risk_score
    }

    pub fn risk_factors(&self) -> &[String] {
        &self.risk_factors
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn recommended_action(&self) -> &str {
        &self.recommended_action
    }

    /// True for fallback results that are not a genuine model opinion
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}
