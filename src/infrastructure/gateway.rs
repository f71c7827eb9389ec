use crate::domain::payment::Gateway;
use crate::domain::ports::{Checkout, CheckoutRequest, GatewayVerification, PaymentGateway};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// How a simulated checkout behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatedBehavior {
    /// Paid in full on the first verify.
    ConfirmImmediately,
    /// Pending for the given number of verifies, then paid in full.
    ConfirmAfter(usize),
    /// Paid, but with a different amount.
    PayAmount(u64),
    NeverConfirm,
    Decline(String),
    /// `initialize` itself fails.
    RejectCheckout(String),
    /// `verify` hangs for the given duration before reporting pending.
    Stall(Duration),
}

#[derive(Debug)]
struct Session {
    amount: u64,
    behavior: SimulatedBehavior,
    polls: usize,
}

/// Deterministic stand-in for Paystack, Flutterwave or a bank transfer desk.
///
/// Behavior is chosen per checkout: a queue of scripted behaviors is consumed
/// in order by `initialize`, falling back to `default_behavior` when empty.
#[derive(Clone)]
pub struct SimulatedGateway {
    provider: Gateway,
    checkout_base_url: String,
    default_behavior: SimulatedBehavior,
    scripted: Arc<RwLock<Vec<SimulatedBehavior>>>,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    verify_calls: Arc<AtomicUsize>,
}

impl SimulatedGateway {
    pub fn new(provider: Gateway, checkout_base_url: impl Into<String>) -> Self {
        Self {
            provider,
            checkout_base_url: checkout_base_url.into(),
            default_behavior: SimulatedBehavior::ConfirmImmediately,
            scripted: Arc::new(RwLock::new(Vec::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            verify_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_default(mut self, behavior: SimulatedBehavior) -> Self {
        self.default_behavior = behavior;
        self
    }

    /// Queues the behavior for the next checkout opened on this gateway.
    pub async fn script_next(&self, behavior: SimulatedBehavior) {
        self.scripted.write().await.push(behavior);
    }

    /// Changes the behavior of an already opened checkout.
    pub async fn rescript(&self, reference: &str, behavior: SimulatedBehavior) {
        if let Some(session) = self.sessions.write().await.get_mut(reference) {
            session.behavior = behavior;
            session.polls = 0;
        }
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn provider(&self) -> Gateway {
        self.provider
    }

    async fn initialize(&self, request: CheckoutRequest) -> Result<Checkout> {
        let behavior = {
            let mut scripted = self.scripted.write().await;
            if scripted.is_empty() {
                self.default_behavior.clone()
            } else {
                scripted.remove(0)
            }
        };

        if let SimulatedBehavior::RejectCheckout(reason) = &behavior {
            return Err(PaymentError::GatewayRejected {
                reference: request.reference,
                reason: reason.clone(),
            });
        }

        self.sessions.write().await.insert(
            request.reference.clone(),
            Session {
                amount: request.amount,
                behavior,
                polls: 0,
            },
        );

        Ok(Checkout {
            redirect_url: format!(
                "{}/{}/{}",
                self.checkout_base_url.trim_end_matches('/'),
                self.provider,
                request.reference
            ),
            reference: request.reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<GatewayVerification> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);

        let (amount, behavior, polls) = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(reference)
                .ok_or_else(|| PaymentError::not_found("checkout", reference))?;
            session.polls += 1;
            (session.amount, session.behavior.clone(), session.polls)
        };

        let paid = |amount_paid| GatewayVerification::Paid {
            amount_paid,
            paid_at: Utc::now(),
        };

        Ok(match behavior {
            SimulatedBehavior::ConfirmImmediately => paid(amount),
            SimulatedBehavior::ConfirmAfter(pending_polls) if polls > pending_polls => paid(amount),
            SimulatedBehavior::ConfirmAfter(_) | SimulatedBehavior::NeverConfirm => {
                GatewayVerification::Pending
            }
            SimulatedBehavior::PayAmount(amount_paid) => paid(amount_paid),
            SimulatedBehavior::Decline(reason) => GatewayVerification::Declined { reason },
            SimulatedBehavior::RejectCheckout(_) => GatewayVerification::Pending,
            SimulatedBehavior::Stall(delay) => {
                tokio::time::sleep(delay).await;
                GatewayVerification::Pending
            }
        })
    }
}
