//! Type definitions for the risk pipeline

pub mod analysis;
pub mod transaction;

pub use analysis::{RecommendedAction, RiskAnalysis};
pub use transaction::{Merchant, PaymentMethod, PaymentMethodKind, Transaction};
