//! Drives the platform from a CSV script of `op,user,target,lesson,amount` rows.
//!
//! | op                | user    | target  | lesson | amount          |
//! |-------------------|---------|---------|--------|-----------------|
//! | `student`         | name    |         |        |                 |
//! | `teacher`         | name    |         |        |                 |
//! | `admin`           | name    |         |        |                 |
//! | `approve_teacher` | admin   | teacher |        |                 |
//! | `dismiss_teacher` | admin   | teacher |        |                 |
//! | `course`          | teacher | course  |        |                 |
//! | `lesson`          | teacher | course  | lesson | price (0 = free)|
//! | `purchase`        | student | course  | lesson | paid (optional) |
//! | `withdraw`        | teacher |         |        | amount          |
//! | `approve`         | admin   | teacher |        |                 |
//! | `reject`          | admin   | teacher |        |                 |
//!
//! Users are addressed by name and registered as `{name}@example.test`.
//! `approve`/`reject` resolve the teacher's oldest pending withdrawal.

use crate::application::identity::NewUser;
use crate::application::settlement::Initiation;
use crate::application::{Collaborators, Platform};
use crate::config::AppConfig;
use crate::domain::catalog::Lesson;
use crate::domain::payment::Gateway;
use crate::domain::ports::{GatewayHandle, Stores};
use crate::domain::user::Role;
use crate::domain::wallet::{Amount, BankDetails, WithdrawalOutcome};
use crate::error::{PaymentError, Result};
use crate::infrastructure::gateway::{SimulatedBehavior, SimulatedGateway};
use crate::interfaces::csv::event_reader::{EventReader, ScriptEvent, ScriptOp};
use crate::interfaces::csv::wallet_writer::WalletStatement;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info, warn};

const REPLAY_PASSWORD: &str = "replay";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub skipped: usize,
}

pub struct ReplayRunner {
    platform: Platform,
    gateway: SimulatedGateway,
}

impl ReplayRunner {
    /// Purchases go through a simulated Paystack checkout that this runner scripts per row.
    pub fn new(stores: Stores, config: &AppConfig) -> Result<Self> {
        let gateway = SimulatedGateway::new(Gateway::Paystack, &config.checkout_base_url);
        let mut collaborators = Collaborators::simulated(config);
        collaborators
            .gateways
            .retain(|g| g.provider() != Gateway::Paystack);
        let scripted: GatewayHandle = Arc::new(gateway.clone());
        collaborators.gateways.push(scripted);

        let platform = Platform::new(stores, collaborators, &config.settlement)?;
        Ok(Self { platform, gateway })
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Applies every row in order. A row that fails is logged and skipped.
    pub async fn run<R: Read>(&self, source: R) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();
        for (index, event) in EventReader::new(source).events().enumerate() {
            let row = index + 1;
            let outcome = match event {
                Ok(event) => self.apply(&event).await.map_err(|err| (Some(event), err)),
                Err(err) => Err((None, err)),
            };
            match outcome {
                Ok(()) => summary.applied += 1,
                Err((event, err)) => {
                    summary.skipped += 1;
                    warn!(
                        row,
                        op = ?event.as_ref().map(|e| e.op),
                        user = event.as_ref().map(|e| e.user.as_str()).unwrap_or("-"),
                        error = %err,
                        "Skipping event"
                    );
                }
            }
        }
        info!(applied = summary.applied, skipped = summary.skipped, "Replay finished");
        Ok(summary)
    }

    /// One statement per wallet, ordered by teacher name.
    pub async fn statements(&self) -> Result<Vec<WalletStatement>> {
        let mut statements = Vec::new();
        for wallet in self.platform.wallets.wallets().await? {
            let name = self
                .platform
                .stores
                .users
                .get(&wallet.teacher_id)
                .await?
                .map(|user| user.name)
                .unwrap_or_else(|| wallet.teacher_id.clone());
            statements.push(WalletStatement::new(name, &wallet));
        }
        statements.sort_by(|a, b| a.teacher.cmp(&b.teacher));
        Ok(statements)
    }

    async fn apply(&self, event: &ScriptEvent) -> Result<()> {
        debug!(op = ?event.op, user = %event.user, "Applying event");
        match event.op {
            ScriptOp::Student => self.register(&event.user, Role::Student).await,
            ScriptOp::Teacher => self.register(&event.user, Role::Teacher).await,
            ScriptOp::Admin => self.register(&event.user, Role::Admin).await,
            ScriptOp::ApproveTeacher | ScriptOp::DismissTeacher => {
                let admin = self.user_id(&event.user).await?;
                let teacher = self.user_id(event.target()?).await?;
                if event.op == ScriptOp::ApproveTeacher {
                    self.platform.admin.approve_teacher(&admin, &teacher).await?;
                } else {
                    self.platform.admin.dismiss_teacher(&admin, &teacher).await?;
                }
                Ok(())
            }
            ScriptOp::Course => {
                let teacher = self.user_id(&event.user).await?;
                let key = event.target()?;
                self.platform
                    .catalog
                    .publish_course(&teacher, key, key)
                    .await?;
                Ok(())
            }
            ScriptOp::Lesson => {
                let teacher = self.user_id(&event.user).await?;
                let price = match event.amount {
                    Some(amount) => whole_naira(amount)?,
                    None => 0,
                };
                let lesson = if price == 0 {
                    Lesson::free(event.lesson()?)
                } else {
                    Lesson::paid(event.lesson()?, price)
                };
                self.platform
                    .catalog
                    .put_lesson(&teacher, event.target()?, lesson)
                    .await?;
                Ok(())
            }
            ScriptOp::Purchase => self.purchase(event).await,
            ScriptOp::Withdraw => {
                let teacher_id = self.user_id(&event.user).await?;
                let bank_details = BankDetails {
                    bank_name: "Replay Bank".to_string(),
                    account_number: "0000000000".to_string(),
                    account_name: event.user.clone(),
                };
                self.platform
                    .wallets
                    .request_withdrawal(&teacher_id, Amount::new(event.amount()?)?, bank_details)
                    .await?;
                Ok(())
            }
            ScriptOp::Approve | ScriptOp::Reject => {
                let admin = self.user_id(&event.user).await?;
                let teacher = self.user_id(event.target()?).await?;
                let pending = self
                    .platform
                    .wallets
                    .pending_withdrawals()
                    .await?
                    .into_iter()
                    .find(|owned| owned.teacher_id == teacher)
                    .ok_or_else(|| PaymentError::not_found("pending withdrawal", event.target().unwrap_or("-")))?;
                let outcome = if event.op == ScriptOp::Approve {
                    WithdrawalOutcome::Approve
                } else {
                    WithdrawalOutcome::Reject
                };
                self.platform
                    .admin
                    .resolve_withdrawal(&admin, pending.transaction.id, outcome)
                    .await?;
                Ok(())
            }
        }
    }

    async fn purchase(&self, event: &ScriptEvent) -> Result<()> {
        let student = self.user_id(&event.user).await?;
        let initiation = self
            .platform
            .settlement
            .initiate(&student, event.target()?, event.lesson()?, Gateway::Paystack)
            .await?;

        let attempt = match initiation {
            Initiation::Free(_) => return Ok(()),
            Initiation::Checkout(attempt) => attempt,
        };
        if let Some(paid) = event.amount {
            self.gateway
                .rescript(&attempt.reference, SimulatedBehavior::PayAmount(whole_naira(paid)?))
                .await;
        }
        self.platform
            .settlement
            .await_confirmation(&attempt.reference)
            .await?;
        Ok(())
    }

    async fn register(&self, name: &str, role: Role) -> Result<()> {
        let (user, token) = self
            .platform
            .identity
            .register(NewUser {
                role,
                email: email_for(name),
                name: name.to_string(),
                password: REPLAY_PASSWORD.to_string(),
                whatsapp: None,
            })
            .await?;
        self.platform.identity.confirm_email(&token).await?;
        debug!(user = %user.id, name, "Registered");
        Ok(())
    }

    async fn user_id(&self, name: &str) -> Result<String> {
        self.platform
            .stores
            .users
            .find_by_email(&email_for(name))
            .await?
            .map(|user| user.id)
            .ok_or_else(|| PaymentError::not_found("user", name))
    }
}

fn email_for(name: &str) -> String {
    format!("{}@example.test", name.trim().to_lowercase())
}

fn whole_naira(amount: Decimal) -> Result<u64> {
    if !amount.fract().is_zero() {
        return Err(PaymentError::ValidationError(format!(
            "lesson prices are whole Naira, got {amount}"
        )));
    }
    amount
        .to_u64()
        .ok_or_else(|| PaymentError::ValidationError(format!("invalid price {amount}")))
}
