//! Risk analysis orchestration: prompt, model call, normalize, validate

use crate::analysis::classifier::classify_provider_failure;
use crate::analysis::normalizer::normalize;
use crate::analysis::prompt::PromptBuilder;
use crate::analysis::validator::SchemaValidator;
use crate::config::{AnalysisConfig, AnalysisPolicy};
use crate::error::{ClassifiedError, ErrorKind};
use crate::providers::ModelProvider;
use crate::types::analysis::RiskAnalysis;
use crate::types::transaction::Transaction;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Produces a [`RiskAnalysis`] or a [`ClassifiedError`] for a transaction.
///
/// Holds no per-request state; share it behind an `Arc` across requests.
pub struct RiskAnalyzer {
    provider: Arc<dyn ModelProvider>,
    prompt_builder: PromptBuilder,
    validator: SchemaValidator,
    policy: AnalysisPolicy,
}

impl RiskAnalyzer {
    /// Create an analyzer from configuration
    pub fn new(provider: Arc<dyn ModelProvider>, config: &AnalysisConfig) -> Self {
        Self {
            provider,
            prompt_builder: PromptBuilder::new(config.action_mode),
            validator: SchemaValidator::new(config.action_mode)
                .allow_extra_fields(config.allow_extra_fields),
            policy: config.policy,
        }
    }

    pub fn policy(&self) -> AnalysisPolicy {
        self.policy
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Analyze one transaction under the configured policy.
    ///
    /// Under [`AnalysisPolicy::DegradedFallback`] every failure except a
    /// configuration error is replaced by a marked fallback analysis.
    pub async fn analyze(&self, tx: &Transaction) -> Result<RiskAnalysis, ClassifiedError> {
        match self.analyze_strict(tx).await {
            Ok(analysis) => Ok(analysis),
            Err(err)
                if self.policy == AnalysisPolicy::DegradedFallback
                    && err.kind() != ErrorKind::ConfigurationError =>
            {
                warn!(
                    transaction_id = %tx.transaction_id,
                    error_kind = %err.kind(),
                    error = %err.message(),
                    "Analysis failed, using fallback analysis"
                );
                Ok(RiskAnalysis::fallback(&err, self.validator.action_mode()))
            }
            Err(err) => Err(err),
        }
    }

    async fn analyze_strict(&self, tx: &Transaction) -> Result<RiskAnalysis, ClassifiedError> {
        let start_time = Instant::now();
        let prompt = self.prompt_builder.build(tx);

        let raw = self
            .provider
            .complete(&prompt)
            .await
            .map_err(|failure| classify_provider_failure(&failure))?;

        let analysis = self.validator.validate(normalize(&raw))?;

        debug!(
            transaction_id = %tx.transaction_id,
            provider = self.provider.name(),
            risk_score = analysis.risk_score(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Model analysis complete"
        );

        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classifier::ProviderFailure;
    use crate::config::ActionMode;
    use crate::types::analysis::FALLBACK_FACTOR_PREFIX;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const LOW_RISK: &str = r#"{"risk_score":0.1,"risk_factors":[],"reasoning":"low risk","recommended_action":"allow"}"#;

    /// Replays one canned outcome and records the prompts it was sent
    struct StubProvider {
        outcome: Result<String, ProviderFailure>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl StubProvider {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(failure: ProviderFailure) -> Arc<Self> {
            Arc::new(Self {
                outcome: Err(failure),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-model"
        }

        async fn complete(&self, prompt: &str) -> Result<String, ProviderFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.outcome.clone()
        }
    }

    fn transaction() -> Transaction {
        Transaction::new(
            "normal-001",
            "user_norm",
            50.0,
            "USD",
            Utc.with_ymd_and_hms(2025, 6, 14, 12, 0, 0).unwrap(),
            "US",
        )
    }

    fn analyzer(provider: Arc<StubProvider>, policy: AnalysisPolicy) -> RiskAnalyzer {
        let config = AnalysisConfig {
            policy,
            ..AnalysisConfig::default()
        };
        RiskAnalyzer::new(provider, &config)
    }

    #[tokio::test]
    async fn test_strict_returns_reply_unchanged() {
        let provider = StubProvider::replying(LOW_RISK);
        let analysis = analyzer(provider.clone(), AnalysisPolicy::Strict)
            .analyze(&transaction())
            .await
            .unwrap();

        assert_eq!(analysis.risk_score(), 0.1);
        assert!(analysis.risk_factors().is_empty());
        assert_eq!(analysis.reasoning(), "low risk");
        assert_eq!(analysis.recommended_action(), "allow");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fenced_reply_matches_unwrapped() {
        let plain = analyzer(StubProvider::replying(LOW_RISK), AnalysisPolicy::Strict)
            .analyze(&transaction())
            .await
            .unwrap();

        let fenced_reply = format!("```json\n{LOW_RISK}\n```");
        let fenced = analyzer(StubProvider::replying(&fenced_reply), AnalysisPolicy::Strict)
            .analyze(&transaction())
            .await
            .unwrap();

        assert_eq!(plain, fenced);
    }

    #[tokio::test]
    async fn test_prose_reply_under_each_policy() {
        let prose = "This transaction appears to be low risk.";

        let err = analyzer(StubProvider::replying(prose), AnalysisPolicy::Strict)
            .analyze(&transaction())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
        assert_eq!(err.raw(), Some(prose));

        let analysis = analyzer(StubProvider::replying(prose), AnalysisPolicy::DegradedFallback)
            .analyze(&transaction())
            .await
            .unwrap();
        assert!(analysis.is_degraded());
        assert_eq!(analysis.risk_score(), 0.5);
        assert!(analysis.risk_factors()[0].starts_with(FALLBACK_FACTOR_PREFIX));
        assert!(analysis.risk_factors()[0].contains("malformed_output"));
    }

    #[tokio::test]
    async fn test_rate_limit_is_classified_and_not_retried() {
        let provider = StubProvider::failing(ProviderFailure::status(429, "quota"));
        let err = analyzer(provider.clone(), AnalysisPolicy::Strict)
            .analyze(&transaction())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_under_fallback() {
        let provider = StubProvider::failing(ProviderFailure::transport("connection refused"));
        let analysis = analyzer(provider, AnalysisPolicy::DegradedFallback)
            .analyze(&transaction())
            .await
            .unwrap();

        assert!(analysis.is_degraded());
        assert!(analysis.risk_factors()[0].contains("transient_provider_error"));
        assert_eq!(analysis.recommended_action(), "Please review manually.");
    }

    #[tokio::test]
    async fn test_prompt_sent_is_deterministic() {
        let provider = StubProvider::replying(LOW_RISK);
        let analyzer = analyzer(provider.clone(), AnalysisPolicy::Strict);

        analyzer.analyze(&transaction()).await.unwrap();
        analyzer.analyze(&transaction()).await.unwrap();

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
        assert!(prompts[0].contains("\"transaction_id\": \"normal-001\""));
    }

    #[tokio::test]
    async fn test_bucketed_mode_flows_through() {
        let config = AnalysisConfig {
            policy: AnalysisPolicy::Strict,
            action_mode: ActionMode::Bucketed,
            allow_extra_fields: false,
        };
        let reply = r#"{"risk_score":0.8,"risk_factors":["x"],"reasoning":"r","recommended_action":"allow"}"#;
        let analyzer = RiskAnalyzer::new(StubProvider::replying(reply), &config);

        let err = analyzer.analyze(&transaction()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
    }

    /// Scores by transaction id found in the prompt, yielding mid-call
    struct PromptKeyedProvider;

    #[async_trait]
    impl ModelProvider for PromptKeyedProvider {
        fn name(&self) -> &str {
            "keyed"
        }

        fn model(&self) -> &str {
            "keyed-model"
        }

        async fn complete(&self, prompt: &str) -> Result<String, ProviderFailure> {
            tokio::task::yield_now().await;
            if prompt.contains("suspicious-002") {
                Ok(r#"{"risk_score":0.9,"risk_factors":["new crypto wallet"],"reasoning":"high risk","recommended_action":"block"}"#.to_string())
            } else {
                Ok(LOW_RISK.to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_calls_do_not_share_state() {
        let analyzer = RiskAnalyzer::new(Arc::new(PromptKeyedProvider), &AnalysisConfig::default());
        let normal = transaction();
        let suspicious = Transaction::new(
            "suspicious-002",
            "user_susp",
            9_500.0,
            "USD",
            Utc.with_ymd_and_hms(2025, 6, 14, 3, 0, 0).unwrap(),
            "RU",
        )
        .with_payment_method(crate::types::transaction::PaymentMethodKind::Crypto, true);

        let (low, high) = tokio::join!(analyzer.analyze(&normal), analyzer.analyze(&suspicious));
        let (low, high) = (low.unwrap(), high.unwrap());

        assert_eq!(low.risk_score(), 0.1);
        assert_eq!(low.recommended_action(), "allow");
        assert_eq!(high.risk_score(), 0.9);
        assert_eq!(high.risk_factors(), ["new crypto wallet".to_string()]);
        assert_eq!(high.recommended_action(), "block");
    }
}
