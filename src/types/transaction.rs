//! Transaction data structures for webhook risk analysis

use crate::error::TransactionValidationError;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Payment instrument category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Card,
    BankTransfer,
    Wallet,
    Crypto,
    Other,
}

/// Payment instrument used for the transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    #[serde(rename = "type")]
    pub kind: PaymentMethodKind,
    /// First time this instrument is seen for the user
    pub is_new: bool,
}

/// Merchant receiving the payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    pub category: String,
    /// Reputation in [0, 1], higher is more trusted
    pub reputation: f64,
}

/// One payment event submitted for risk evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier
    pub transaction_id: String,

    /// User who made the transaction
    pub user_id: String,

    /// Amount in the given currency
    pub amount: f64,

    /// ISO currency code, e.g. USD
    pub currency: String,

    /// RFC3339 timestamp of the transaction, kept as the caller wrote it
    pub timestamp: String,

    /// 2-letter country code
    pub country: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<Merchant>,
}

impl Transaction {
    /// Create a new transaction with required fields
    pub fn new(
        transaction_id: impl Into<String>,
        user_id: impl Into<String>,
        amount: f64,
        currency: impl Into<String>,
        timestamp: DateTime<Utc>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            user_id: user_id.into(),
            amount,
            currency: currency.into(),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            country: country.into(),
            payment_method: None,
            merchant: None,
        }
    }

    pub fn with_payment_method(mut self, kind: PaymentMethodKind, is_new: bool) -> Self {
        self.payment_method = Some(PaymentMethod { kind, is_new });
        self
    }

    pub fn with_merchant(mut self, category: impl Into<String>, reputation: f64) -> Self {
        self.merchant = Some(Merchant {
            category: category.into(),
            reputation,
        });
        self
    }

    /// Timestamp parsed with its original offset
    pub fn parsed_timestamp(&self) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(&self.timestamp)
    }

    /// Check the field constraints the webhook contract promises
    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if self.transaction_id.trim().is_empty() {
            return Err(TransactionValidationError::EmptyField("transaction_id"));
        }
        if self.user_id.trim().is_empty() {
            return Err(TransactionValidationError::EmptyField("user_id"));
        }
        if self.parsed_timestamp().is_err() {
            return Err(TransactionValidationError::InvalidTimestamp(
                self.timestamp.clone(),
            ));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(TransactionValidationError::NonPositiveAmount(self.amount));
        }
        if !is_alpha_code(&self.currency, 3) {
            return Err(TransactionValidationError::InvalidCurrency(
                self.currency.clone(),
            ));
        }
        if !is_alpha_code(&self.country, 2) {
            return Err(TransactionValidationError::InvalidCountry(
                self.country.clone(),
            ));
        }
        if let Some(merchant) = &self.merchant {
            if merchant.category.trim().is_empty() {
                return Err(TransactionValidationError::EmptyField("merchant.category"));
            }
            if !(0.0..=1.0).contains(&merchant.reputation) {
                return Err(TransactionValidationError::ReputationOutOfRange(
                    merchant.reputation,
                ));
            }
        }
        Ok(())
    }
}

fn is_alpha_code(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_alphabetic())
}
