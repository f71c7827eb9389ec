//! Adapters behind the domain ports: storage backends, gateways and identity helpers.

pub mod credentials;
pub mod gateway;
pub mod in_memory;
pub mod payouts;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod tokens;

use crate::application::Collaborators;
use crate::config::AppConfig;
use crate::domain::payment::Gateway;
use crate::domain::ports::GatewayHandle;
use credentials::Sha256Credentials;
use gateway::SimulatedGateway;
use payouts::LoggingPayouts;
use std::sync::Arc;
use tokens::InMemoryTokenService;

impl Collaborators {
    /// Simulated gateways for every provider plus the in-process identity helpers.
    pub fn simulated(config: &AppConfig) -> Self {
        let gateways = [Gateway::Paystack, Gateway::Flutterwave, Gateway::BankTransfer]
            .into_iter()
            .map(|provider| -> GatewayHandle {
                Arc::new(SimulatedGateway::new(provider, &config.checkout_base_url))
            })
            .collect();
        Self {
            gateways,
            tokens: Arc::new(InMemoryTokenService::new(config.confirmation_token_ttl)),
            credentials: Arc::new(Sha256Credentials),
            payouts: Arc::new(LoggingPayouts),
        }
    }
}
