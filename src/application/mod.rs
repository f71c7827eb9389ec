//! Application services: the ledger, the wallet engine, payment settlement and
//! the admin desk, plus the identity and catalog services that feed them.
//!
//! `Platform` wires every service over one set of stores so interfaces can
//! share a single instance behind an `Arc`.

pub mod admin;
pub mod catalog;
pub mod entitlements;
pub mod identity;
pub mod settlement;
pub mod wallet;

use crate::config::SettlementConfig;
use crate::domain::ports::{
    CredentialCheckHandle, GatewayHandle, PayoutHandle, Stores, TokenServiceHandle,
};
use crate::error::Result;
use admin::AdminDesk;
use catalog::CatalogService;
use entitlements::EntitlementLedger;
use identity::IdentityService;
use settlement::SettlementCoordinator;
use std::sync::Arc;
use wallet::{PlatformFee, WalletEngine};

/// Capabilities the services call out to.
#[derive(Clone)]
pub struct Collaborators {
    pub gateways: Vec<GatewayHandle>,
    pub tokens: TokenServiceHandle,
    pub credentials: CredentialCheckHandle,
    pub payouts: PayoutHandle,
}

#[derive(Clone)]
pub struct Platform {
    pub stores: Stores,
    pub identity: Arc<IdentityService>,
    pub catalog: Arc<CatalogService>,
    pub ledger: Arc<EntitlementLedger>,
    pub wallets: Arc<WalletEngine>,
    pub settlement: Arc<SettlementCoordinator>,
    pub admin: Arc<AdminDesk>,
}

impl Platform {
    pub fn new(stores: Stores, collaborators: Collaborators, config: &SettlementConfig) -> Result<Self> {
        let retries = config.max_conflict_retries;
        let ledger = Arc::new(EntitlementLedger::new(
            stores.courses.clone(),
            stores.grants.clone(),
        ));
        let wallets = Arc::new(WalletEngine::new(
            stores.wallets.clone(),
            PlatformFee::new(config.platform_fee_percent)?,
            retries,
        ));
        let settlement = Arc::new(SettlementCoordinator::new(
            stores.users.clone(),
            ledger.clone(),
            wallets.clone(),
            stores.attempts.clone(),
            collaborators.gateways,
            config.clone(),
        ));
        let admin = Arc::new(AdminDesk::new(
            stores.users.clone(),
            wallets.clone(),
            collaborators.payouts,
            retries,
        ));
        let identity = Arc::new(IdentityService::new(
            stores.users.clone(),
            collaborators.tokens,
            collaborators.credentials,
            retries,
        ));
        let catalog = Arc::new(CatalogService::new(
            stores.users.clone(),
            stores.courses.clone(),
        ));

        Ok(Self {
            stores,
            identity,
            catalog,
            ledger,
            wallets,
            settlement,
            admin,
        })
    }
}
