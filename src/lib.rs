//! Transaction Risk Service Library
//!
//! Receives transaction webhooks, asks a hosted generative model for a
//! structured risk opinion, and relays the transaction and the opinion to an
//! admin webhook.

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod providers;
pub mod types;

pub use analysis::RiskAnalyzer;
pub use config::AppConfig;
pub use error::{ClassifiedError, ErrorKind};
pub use notifier::AdminNotifier;
pub use types::{analysis::RiskAnalysis, transaction::Transaction};
