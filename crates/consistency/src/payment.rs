//! Payment gateway seam and in-memory implementation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use domain::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier the gateway assigns to a captured charge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChargeId(String);

impl ChargeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChargeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single charge for a whole checkout batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub amount: Money,
    pub currency: String,
    pub token: String,
    pub description: String,
    pub receipt_email: Option<String>,
}

/// Why a charge did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The card or token was refused.
    #[error("Payment declined: {0}")]
    Declined(String),

    /// The gateway failed to process the request.
    #[error("Payment gateway error: {0}")]
    Gateway(String),
}

/// Trait for the external payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Captures `request.amount` using the supplied token.
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeId, PaymentError>;
}

#[async_trait]
impl<G: PaymentGateway + ?Sized> PaymentGateway for Arc<G> {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeId, PaymentError> {
        (**self).charge(request).await
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    charges: Vec<(ChargeId, ChargeRequest)>,
    next_id: u32,
    decline: bool,
    gateway_error: bool,
    latency: Option<Duration>,
}

/// In-memory payment gateway for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a gateway that accepts every charge.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryGatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the gateway to decline charges.
    pub fn set_decline(&self, decline: bool) {
        self.state().decline = decline;
    }

    /// Configures the gateway to fail with a gateway error.
    pub fn set_gateway_error(&self, fail: bool) {
        self.state().gateway_error = fail;
    }

    /// Delays every charge by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// Returns the number of captured charges.
    pub fn charge_count(&self) -> usize {
        self.state().charges.len()
    }

    /// Returns the captured charges in order.
    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.state().charges.iter().map(|(_, r)| r.clone()).collect()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeId, PaymentError> {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        if state.gateway_error {
            return Err(PaymentError::Gateway("gateway unavailable".to_string()));
        }
        if state.decline {
            return Err(PaymentError::Declined("card declined".to_string()));
        }
        if request.token.trim().is_empty() {
            return Err(PaymentError::Declined("missing payment token".to_string()));
        }

        state.next_id += 1;
        let id = ChargeId::new(format!("ch_{:06}", state.next_id));
        state.charges.push((id.clone(), request));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: i64) -> ChargeRequest {
        ChargeRequest {
            amount: Money::from_minor(amount),
            currency: "inr".to_string(),
            token: "tok_visa".to_string(),
            description: "2 books".to_string(),
            receipt_email: Some("buyer@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn test_sequential_charge_ids() {
        let gateway = InMemoryPaymentGateway::new();
        let first = gateway.charge(request(1000)).await.unwrap();
        let second = gateway.charge(request(2000)).await.unwrap();

        assert_eq!(first.as_str(), "ch_000001");
        assert_eq!(second.as_str(), "ch_000002");
        assert_eq!(gateway.charge_count(), 2);
        assert_eq!(gateway.charges()[1].amount, Money::from_minor(2000));
    }

    #[tokio::test]
    async fn test_decline() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_decline(true);

        let result = gateway.charge(request(1000)).await;
        assert!(matches!(result, Err(PaymentError::Declined(_))));
        assert_eq!(gateway.charge_count(), 0);
    }

    #[tokio::test]
    async fn test_gateway_error() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_gateway_error(true);

        let result = gateway.charge(request(1000)).await;
        assert!(matches!(result, Err(PaymentError::Gateway(_))));
    }

    #[tokio::test]
    async fn test_empty_token_is_declined() {
        let gateway = InMemoryPaymentGateway::new();
        let mut req = request(1000);
        req.token = " ".to_string();

        assert!(matches!(
            gateway.charge(req).await,
            Err(PaymentError::Declined(_))
        ));
    }
}
