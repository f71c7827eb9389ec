use crate::domain::ports::WalletStoreHandle;
use crate::domain::wallet::{
    Amount, Balance, BankDetails, FeeSplit, TeacherWallet, WalletTransaction, WithdrawalOutcome,
};
use crate::error::{PaymentError, Result};
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use tracing::{debug, info};
use uuid::Uuid;

/// Highest accepted fee. At 99% a ₦1 sale still leaves the teacher one kobo.
pub const MAX_PLATFORM_FEE_PERCENT: Decimal = dec!(99);

/// Fixed percentage of each lesson sale retained by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformFee {
    percent: Decimal,
}

impl PlatformFee {
    pub fn new(percent: Decimal) -> Result<Self> {
        if percent < Decimal::ZERO || percent > MAX_PLATFORM_FEE_PERCENT {
            return Err(PaymentError::ValidationError(format!(
                "platform fee must be in [0, {MAX_PLATFORM_FEE_PERCENT}], got {percent}"
            )));
        }
        Ok(Self { percent })
    }

    pub fn percent(&self) -> Decimal {
        self.percent
    }

    /// Teacher share is rounded down to the kobo; the platform keeps the remainder.
    pub fn split(&self, gross: u64) -> FeeSplit {
        let gross = Decimal::from(gross);
        let teacher_share = (gross * (dec!(100) - self.percent) / dec!(100))
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);
        FeeSplit {
            gross: Balance::new(gross),
            teacher_share: Balance::new(teacher_share),
            platform_share: Balance::new(gross - teacher_share),
        }
    }
}

/// A pending withdrawal together with the wallet it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedTransaction {
    pub teacher_id: String,
    pub transaction: WalletTransaction,
}

/// Owns teacher balances and their append-only transaction logs.
///
/// Every mutation reads the wallet, applies the change to a copy and writes it
/// back with a compare-and-swap on `version`, retrying on a lost race.
pub struct WalletEngine {
    wallets: WalletStoreHandle,
    fee: PlatformFee,
    max_conflict_retries: usize,
}

impl WalletEngine {
    pub fn new(wallets: WalletStoreHandle, fee: PlatformFee, max_conflict_retries: usize) -> Self {
        Self {
            wallets,
            fee,
            max_conflict_retries,
        }
    }

    pub fn fee(&self) -> PlatformFee {
        self.fee
    }

    /// Credits `amount` once per `linked_reference`; a repeat returns the original entry.
    pub async fn credit(
        &self,
        teacher_id: &str,
        amount: Amount,
        description: &str,
        linked_reference: &str,
    ) -> Result<WalletTransaction> {
        self.credit_with_fee(teacher_id, amount, description, linked_reference, None)
            .await
    }

    /// Splits a lesson sale and credits only the teacher share.
    pub async fn credit_sale(
        &self,
        teacher_id: &str,
        gross: u64,
        description: &str,
        reference: &str,
    ) -> Result<WalletTransaction> {
        let split = self.fee.split(gross);
        let share = Amount::new(split.teacher_share.value())?;
        self.credit_with_fee(teacher_id, share, description, reference, Some(split))
            .await
    }

    async fn credit_with_fee(
        &self,
        teacher_id: &str,
        amount: Amount,
        description: &str,
        reference: &str,
        fee: Option<FeeSplit>,
    ) -> Result<WalletTransaction> {
        let tx = self
            .mutate(teacher_id, |wallet| {
                if let Some(existing) = wallet.credit_for(reference) {
                    debug!(teacher = %wallet.teacher_id, reference, "Credit already recorded");
                    return Ok(Mutation::Unchanged(existing.clone()));
                }
                Ok(Mutation::Changed(wallet.credit(
                    amount,
                    description,
                    Some(reference.to_string()),
                    fee,
                    Utc::now(),
                )))
            })
            .await?;

        info!(
            teacher = teacher_id,
            reference,
            amount = %tx.amount,
            "Wallet credited"
        );
        Ok(tx)
    }

    /// Reserves funds for a withdrawal; fails with `InsufficientFunds` above the balance.
    pub async fn request_withdrawal(
        &self,
        teacher_id: &str,
        amount: Amount,
        bank_details: BankDetails,
    ) -> Result<WalletTransaction> {
        bank_details.validate()?;
        let tx = self
            .mutate(teacher_id, |wallet| {
                wallet
                    .reserve_withdrawal(amount, bank_details.clone(), Utc::now())
                    .map(Mutation::Changed)
            })
            .await?;

        info!(
            teacher = teacher_id,
            transaction = %tx.id,
            amount = %tx.amount,
            "Withdrawal requested"
        );
        Ok(tx)
    }

    pub async fn resolve_withdrawal(
        &self,
        teacher_id: &str,
        transaction_id: Uuid,
        outcome: WithdrawalOutcome,
    ) -> Result<WalletTransaction> {
        if self.wallets.get(teacher_id).await?.is_none() {
            return Err(PaymentError::not_found("wallet", teacher_id));
        }
        let tx = self
            .mutate(teacher_id, |wallet| {
                wallet
                    .resolve_withdrawal(transaction_id, outcome, Utc::now())
                    .map(Mutation::Changed)
            })
            .await?;

        info!(
            teacher = teacher_id,
            transaction = %tx.id,
            status = ?tx.status,
            "Withdrawal resolved"
        );
        Ok(tx)
    }

    /// The teacher's wallet, or an empty one if nothing was ever credited.
    pub async fn wallet(&self, teacher_id: &str) -> Result<TeacherWallet> {
        Ok(self
            .wallets
            .get(teacher_id)
            .await?
            .unwrap_or_else(|| TeacherWallet::new(teacher_id)))
    }

    pub async fn wallets(&self) -> Result<Vec<TeacherWallet>> {
        let mut wallets = self.wallets.get_all().await?;
        wallets.sort_by(|a, b| a.teacher_id.cmp(&b.teacher_id));
        Ok(wallets)
    }

    /// Pending debits across all wallets, oldest first.
    pub async fn pending_withdrawals(&self) -> Result<Vec<OwnedTransaction>> {
        let mut pending: Vec<OwnedTransaction> = self
            .wallets
            .get_all()
            .await?
            .into_iter()
            .flat_map(|wallet| {
                let teacher_id = wallet.teacher_id;
                wallet
                    .transactions
                    .into_iter()
                    .filter(WalletTransaction::is_pending_debit)
                    .map(move |transaction| OwnedTransaction {
                        teacher_id: teacher_id.clone(),
                        transaction,
                    })
            })
            .collect();
        pending.sort_by(|a, b| a.transaction.date.cmp(&b.transaction.date));
        Ok(pending)
    }

    pub async fn find_transaction(&self, transaction_id: Uuid) -> Result<OwnedTransaction> {
        self.wallets
            .get_all()
            .await?
            .into_iter()
            .find_map(|wallet| {
                wallet
                    .transaction(transaction_id)
                    .cloned()
                    .map(|transaction| OwnedTransaction {
                        teacher_id: wallet.teacher_id.clone(),
                        transaction,
                    })
            })
            .ok_or_else(|| PaymentError::not_found("wallet transaction", transaction_id.to_string()))
    }

    /// Sum of platform fees recorded on every sale credit.
    pub async fn platform_revenue(&self) -> Result<Balance> {
        Ok(self
            .wallets
            .get_all()
            .await?
            .iter()
            .map(TeacherWallet::platform_fees)
            .fold(Balance::ZERO, |acc, fee| acc + fee))
    }

    async fn mutate<F>(&self, teacher_id: &str, apply: F) -> Result<WalletTransaction>
    where
        F: Fn(&mut TeacherWallet) -> Result<Mutation> + Send + Sync,
    {
        for _ in 0..=self.max_conflict_retries {
            let current = self.wallets.get(teacher_id).await?;
            let expected_version = current.as_ref().map(|w| w.version);
            let mut wallet = current.unwrap_or_else(|| TeacherWallet::new(teacher_id));

            let tx = match apply(&mut wallet)? {
                Mutation::Unchanged(tx) => return Ok(tx),
                Mutation::Changed(tx) => tx,
            };
            wallet.check_invariants()?;
            wallet.version = expected_version.unwrap_or(0) + 1;

            if self.wallets.compare_and_swap(expected_version, wallet).await? {
                return Ok(tx);
            }
            debug!(teacher = teacher_id, "Wallet write conflict, retrying");
        }
        Err(PaymentError::Conflict {
            entity: "wallet",
            key: teacher_id.to_string(),
        })
    }
}

enum Mutation {
    Changed(WalletTransaction),
    Unchanged(WalletTransaction),
}
