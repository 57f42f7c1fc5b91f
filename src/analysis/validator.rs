//! Schema validation of normalized model output

use crate::config::ActionMode;
use crate::error::ClassifiedError;
use crate::types::analysis::{RecommendedAction, RiskAnalysis};
use serde_json::{Map, Value};

const REQUIRED_FIELDS: [&str; 4] = [
    "risk_score",
    "risk_factors",
    "reasoning",
    "recommended_action",
];

/// Turns normalized model text into a [`RiskAnalysis`] or a MalformedOutput
/// error. Never coerces: a wrong type is a failure, not a conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator {
    action_mode: ActionMode,
    allow_extra_fields: bool,
}

impl SchemaValidator {
    pub fn new(action_mode: ActionMode) -> Self {
        Self {
            action_mode,
            allow_extra_fields: false,
        }
    }

    /// Accept objects that carry keys beyond the four required ones
    pub fn allow_extra_fields(mut self, allow: bool) -> Self {
        self.allow_extra_fields = allow;
        self
    }

    pub fn action_mode(&self) -> ActionMode {
        self.action_mode
    }

    /// Parse and validate. Errors carry the offending text as raw payload.
    pub fn validate(&self, text: &str) -> Result<RiskAnalysis, ClassifiedError> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            ClassifiedError::malformed(format!("model reply is not valid JSON: {e}"))
                .with_raw(text)
        })?;

        self.validate_value(&value)
            .map_err(|reason| ClassifiedError::malformed(reason).with_raw(text))
    }

    fn validate_value(&self, value: &Value) -> Result<RiskAnalysis, String> {
        let object = value
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, got {}", type_name(value)))?;

        for field in REQUIRED_FIELDS {
            if !object.contains_key(field) {
                return Err(format!("missing required field {field:?}"));
            }
        }
        if !self.allow_extra_fields {
            if let Some(extra) = object.keys().find(|k| !REQUIRED_FIELDS.contains(&k.as_str())) {
                return Err(format!("unexpected field {extra:?}"));
            }
        }

        let risk_score = risk_score(object)?;
        let risk_factors = risk_factors(object)?;
        let reasoning = non_empty_string(object, "reasoning")?;
        let recommended_action = self.recommended_action(object, risk_score)?;

        Ok(RiskAnalysis::from_validated(
            risk_score,
            risk_factors,
            reasoning,
            recommended_action,
        ))
    }

    fn recommended_action(
        &self,
        object: &Map<String, Value>,
        risk_score: f64,
    ) -> Result<String, String> {
        let action = non_empty_string(object, "recommended_action")?;

        match self.action_mode {
            ActionMode::FreeText => Ok(action),
            ActionMode::Enumerated => Ok(action.parse::<RecommendedAction>()?.to_string()),
            ActionMode::Bucketed => {
                let parsed = action.parse::<RecommendedAction>()?;
                let expected = RecommendedAction::from_score(risk_score);
                if parsed != expected {
                    return Err(format!(
                        "recommended_action {parsed} is inconsistent with risk_score \
                         {risk_score} (expected {expected})"
                    ));
                }
                Ok(parsed.to_string())
            }
        }
    }
}

fn risk_score(object: &Map<String, Value>) -> Result<f64, String> {
    let value = &object["risk_score"];
    let score = value
        .as_f64()
        .ok_or_else(|| format!("risk_score must be a number, got {}", type_name(value)))?;

    if !(0.0..=1.0).contains(&score) {
        return Err(format!("risk_score {score} is outside [0, 1]"));
    }
    Ok(score)
}

fn risk_factors(object: &Map<String, Value>) -> Result<Vec<String>, String> {
    let value = &object["risk_factors"];
    let items = value
        .as_array()
        .ok_or_else(|| format!("risk_factors must be an array, got {}", type_name(value)))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                format!("risk_factors[{i}] must be a string, got {}", type_name(item))
            })
        })
        .collect()
}

fn non_empty_string(object: &Map<String, Value>, field: &str) -> Result<String, String> {
    let value = &object[field];
    let text = value
        .as_str()
        .ok_or_else(|| format!("{field} must be a string, got {}", type_name(value)))?;

    if text.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(text.to_string())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
