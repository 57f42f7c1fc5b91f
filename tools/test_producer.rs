//! Test Transaction Producer
//!
//! Generates test transactions and posts them to the risk service webhook.
//!
//! Usage: `test_producer [webhook_url] [api_key] [count] [suspicious_rate] [delay_ms]`

use anyhow::Context;
use chrono::{Timelike, Utc};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};
use txn_risk_service::types::transaction::{PaymentMethodKind, Transaction};

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    transaction_counter: u64,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            transaction_counter: 0,
        }
    }

    fn next_id(&mut self) -> String {
        self.transaction_counter += 1;
        format!("tx_{:012}", self.transaction_counter)
    }

    /// Generate a random legitimate transaction
    fn generate_legitimate(&mut self) -> Transaction {
        let id = self.next_id();
        let user = format!("user_{}", self.rng.gen_range(1..500));
        let amount = (self.rng.gen_range(10.0..500.0_f64) * 100.0).round() / 100.0;
        let (currency, country) =
            *self.random_choice(&[("USD", "US"), ("EUR", "DE"), ("GBP", "GB"), ("CAD", "CA")]);
        let category = *self.random_choice(&["groceries", "restaurants", "fuel", "pharmacy"]);
        let reputation = self.rng.gen_range(0.7..1.0);
        let is_new = self.rng.gen_bool(0.05);

        Transaction::new(id, user, amount, currency, Utc::now(), country)
            .with_payment_method(PaymentMethodKind::Card, is_new)
            .with_merchant(category, reputation)
    }

    /// Generate a suspicious transaction
    fn generate_suspicious(&mut self) -> Transaction {
        let id = self.next_id();
        let user = format!("user_{}", self.rng.gen_range(1..500));
        let amount = (self.rng.gen_range(1000.0..10000.0_f64) * 100.0).round() / 100.0; // High amount
        // Currency and country mismatch, high-risk countries included
        let (currency, country) = *self.random_choice(&[("USD", "RU"), ("EUR", "US"), ("USD", "CN")]);
        let method = *self.random_choice(&[PaymentMethodKind::Crypto, PaymentMethodKind::Wallet]);
        let category = *self.random_choice(&["gift_cards", "electronics", "money_transfer"]);
        let reputation = self.rng.gen_range(0.0..0.3); // Poorly rated merchant
        // Night-time activity: today between 00:00 and 04:59 UTC
        let now = Utc::now();
        let (hour, minute) = (self.rng.gen_range(0..5), self.rng.gen_range(0..60));
        let timestamp = now
            .with_hour(hour)
            .and_then(|t| t.with_minute(minute))
            .unwrap_or(now);

        Transaction::new(id, user, amount, currency, timestamp, country)
            .with_payment_method(method, true)
            .with_merchant(category, reputation)
    }

    fn random_choice<'a, T>(&mut self, choices: &'a [T]) -> &'a T {
        &choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Transaction Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let webhook_url = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("http://localhost:8000/webhook/transaction");
    let api_key = args.get(2).cloned().unwrap_or_else(|| {
        std::env::var("API_KEY").unwrap_or_else(|_| "testkey".to_string())
    });
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(20);
    let suspicious_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.2);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(500);

    info!(
        webhook_url = %webhook_url,
        count = count,
        suspicious_rate = suspicious_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")?;

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    let mut accepted = 0;
    let mut rejected = 0;

    for i in 0..count {
        let transaction = if rng.gen_bool(suspicious_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        let response = match client
            .post(webhook_url)
            .header("X-API-Key", &api_key)
            .json(&transaction)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_connect() && i == 0 => {
                warn!(error = %e, "Risk service unreachable. Running in dry-run mode.");
                return run_dry_mode(generator, count, suspicious_rate, delay_ms).await;
            }
            Err(e) => {
                warn!(transaction_id = %transaction.transaction_id, error = %e, "Request failed");
                rejected += 1;
                continue;
            }
        };

        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        if status.is_success() {
            accepted += 1;
            info!(
                transaction_id = %transaction.transaction_id,
                risk_score = %body["analysis"]["risk_score"],
                action = %body["analysis"]["recommended_action"],
                "Transaction analyzed"
            );
        } else {
            rejected += 1;
            warn!(
                transaction_id = %transaction.transaction_id,
                status = status.as_u16(),
                detail = %body["detail"],
                "Transaction rejected"
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} transactions ({} accepted, {} rejected)",
        count, accepted, rejected
    );

    Ok(())
}

async fn run_dry_mode(
    mut generator: TransactionGenerator,
    count: u64,
    suspicious_rate: f64,
    delay_ms: u64,
) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no risk service)");

    let mut rng = rand::thread_rng();

    for i in 0..count {
        let transaction = if rng.gen_bool(suspicious_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        let json = serde_json::to_string_pretty(&transaction)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample transaction {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
