//! Prompt rendering for the risk model.
//!
//! The transaction is rendered as pretty-printed JSON with sorted keys, so
//! field-identical transactions always produce byte-identical prompts.

use crate::config::ActionMode;
use crate::types::transaction::Transaction;
use serde_json::Value;

/// System message sent alongside the prompt by chat-style providers
pub const SYSTEM_INSTRUCTION: &str = "You analyze transaction risk.";

const TASK_HEADER: &str = "You are a financial risk analysis engine. \
Given the following JSON transaction, output a JSON object with exactly these keys:\n\n";

const FREE_TEXT_ACTION: &str = "  • recommended_action (one-sentence suggested next step)\n";

const ENUMERATED_ACTION: &str =
    "  • recommended_action (exactly one of \"allow\", \"review\", \"block\")\n";

const BUCKETED_ACTION: &str = "  • recommended_action (exactly one of \"allow\", \"review\", \"block\"; \
use \"allow\" when risk_score < 0.3, \"review\" when 0.3 <= risk_score < 0.7, \
\"block\" when risk_score >= 0.7)\n";

/// Builds the instruction string sent to the model.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder {
    action_mode: ActionMode,
}

impl PromptBuilder {
    pub fn new(action_mode: ActionMode) -> Self {
        Self { action_mode }
    }

    /// Render the full prompt for a transaction.
    pub fn build(&self, tx: &Transaction) -> String {
        let mut prompt = String::with_capacity(1024);

        prompt.push_str(TASK_HEADER);
        prompt.push_str("  • risk_score (a number between 0 and 1)\n");
        prompt.push_str("  • risk_factors (an array of strings explaining what drove the score)\n");
        prompt.push_str("  • reasoning (a concise explanation in one paragraph)\n");
        prompt.push_str(match self.action_mode {
            ActionMode::FreeText => FREE_TEXT_ACTION,
            ActionMode::Enumerated => ENUMERATED_ACTION,
            ActionMode::Bucketed => BUCKETED_ACTION,
        });
        prompt.push_str("\nHere is the transaction:\n\n");
        prompt.push_str(&canonical_json(tx));
        prompt.push_str("\n\nRespond **ONLY** with the JSON object.");

        prompt
    }
}

/// Sorted-key, pretty-printed JSON encoding of a transaction
pub fn canonical_json(tx: &Transaction) -> String {
    // `Value` objects are BTreeMap-backed, which sorts keys at every depth.
    // Transaction has only string keys, so `to_value` cannot fail.
    let value = serde_json::to_value(tx).unwrap_or_default();
    match serde_json::to_string_pretty(&value) {
        Ok(json) => json,
        Err(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::PaymentMethodKind;
    use chrono::{TimeZone, Utc};

    fn sample() -> Transaction {
        Transaction::new(
            "normal-001",
            "user_norm",
            50.0,
            "USD",
            Utc.with_ymd_and_hms(2025, 6, 14, 12, 0, 0).unwrap(),
            "US",
        )
        .with_payment_method(PaymentMethodKind::Card, true)
        .with_merchant("electronics", 0.8)
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let builder = PromptBuilder::new(ActionMode::FreeText);

        let first = builder.build(&sample());
        let second = builder.build(&sample().clone());

        assert_eq!(first, second);
    }

    #[test]
    fn test_prompt_names_required_fields() {
        let prompt = PromptBuilder::default().build(&sample());

        for field in ["risk_score", "risk_factors", "reasoning", "recommended_action"] {
            assert!(prompt.contains(field), "missing {field}");
        }
        assert!(prompt.ends_with("Respond **ONLY** with the JSON object."));
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let json = canonical_json(&sample());

        let amount = json.find("\"amount\"").unwrap();
        let country = json.find("\"country\"").unwrap();
        let user = json.find("\"user_id\"").unwrap();
        assert!(amount < country && country < user);

        // nested objects are sorted too
        let is_new = json.find("\"is_new\"").unwrap();
        let kind = json.find("\"type\"").unwrap();
        assert!(is_new < kind);
        assert!(json.contains("\"timestamp\": \"2025-06-14T12:00:00Z\""));
    }

    #[test]
    fn test_action_mode_changes_instruction() {
        let free = PromptBuilder::new(ActionMode::FreeText).build(&sample());
        let bucketed = PromptBuilder::new(ActionMode::Bucketed).build(&sample());

        assert!(free.contains("one-sentence suggested next step"));
        assert!(bucketed.contains("\"block\" when risk_score >= 0.7"));
        assert_ne!(free, bucketed);
    }
}
