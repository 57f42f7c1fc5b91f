//! Risk analysis pipeline components

pub mod analyzer;
pub mod classifier;
pub mod normalizer;
pub mod prompt;
pub mod validator;

pub use analyzer::RiskAnalyzer;
pub use classifier::{classify_provider_failure, ProviderFailure};
pub use normalizer::normalize;
pub use prompt::PromptBuilder;
pub use validator::SchemaValidator;
