use crate::application::wallet::WalletEngine;
use crate::domain::ports::{PayoutHandle, UserStoreHandle};
use crate::domain::user::{Role, User};
use crate::domain::wallet::{WalletTransaction, WithdrawalOutcome};
use crate::error::{PaymentError, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// A pending withdrawal as shown on the admin queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingWithdrawal {
    pub teacher_id: String,
    pub teacher_name: String,
    pub transaction: WalletTransaction,
}

/// Admin-only operations: the withdrawal queue and teacher vetting.
pub struct AdminDesk {
    users: UserStoreHandle,
    wallets: Arc<WalletEngine>,
    payouts: PayoutHandle,
    max_conflict_retries: usize,
}

impl AdminDesk {
    pub fn new(
        users: UserStoreHandle,
        wallets: Arc<WalletEngine>,
        payouts: PayoutHandle,
        max_conflict_retries: usize,
    ) -> Self {
        Self {
            users,
            wallets,
            payouts,
            max_conflict_retries,
        }
    }

    pub async fn list_pending_withdrawals(&self, actor_id: &str) -> Result<Vec<PendingWithdrawal>> {
        self.authorize(actor_id).await?;

        let mut queue = Vec::new();
        for owned in self.wallets.pending_withdrawals().await? {
            let teacher_name = self
                .users
                .get(&owned.teacher_id)
                .await?
                .map(|teacher| teacher.name)
                .unwrap_or_default();
            queue.push(PendingWithdrawal {
                teacher_id: owned.teacher_id,
                teacher_name,
                transaction: owned.transaction,
            });
        }
        Ok(queue)
    }

    pub async fn approve_withdrawal(&self, actor_id: &str, transaction_id: Uuid) -> Result<WalletTransaction> {
        self.resolve_withdrawal(actor_id, transaction_id, WithdrawalOutcome::Approve)
            .await
    }

    pub async fn reject_withdrawal(&self, actor_id: &str, transaction_id: Uuid) -> Result<WalletTransaction> {
        self.resolve_withdrawal(actor_id, transaction_id, WithdrawalOutcome::Reject)
            .await
    }

    /// Settles a pending withdrawal. Approved ones are handed to the payout dispatcher;
    /// a dispatch failure is logged and does not undo the approval.
    pub async fn resolve_withdrawal(
        &self,
        actor_id: &str,
        transaction_id: Uuid,
        outcome: WithdrawalOutcome,
    ) -> Result<WalletTransaction> {
        let admin = self.authorize(actor_id).await?;
        let owned = self.wallets.find_transaction(transaction_id).await?;
        let tx = self
            .wallets
            .resolve_withdrawal(&owned.teacher_id, transaction_id, outcome)
            .await?;
        info!(
            admin = %admin.id,
            teacher = %owned.teacher_id,
            transaction = %transaction_id,
            outcome = ?outcome,
            "Withdrawal reviewed"
        );

        if outcome == WithdrawalOutcome::Approve {
            match self.users.get(&owned.teacher_id).await? {
                Some(teacher) => {
                    if let Err(err) = self.payouts.dispatch(&teacher, &tx).await {
                        error!(transaction = %transaction_id, error = %err, "Payout dispatch failed");
                    }
                }
                None => error!(
                    teacher = %owned.teacher_id,
                    transaction = %transaction_id,
                    "Approved withdrawal for unknown teacher, payout not dispatched"
                ),
            }
        }
        Ok(tx)
    }

    pub async fn approve_teacher(&self, actor_id: &str, teacher_id: &str) -> Result<User> {
        self.set_teacher_approval(actor_id, teacher_id, true).await
    }

    /// Revokes approval. Existing grants and wallet balances are untouched.
    pub async fn dismiss_teacher(&self, actor_id: &str, teacher_id: &str) -> Result<User> {
        self.set_teacher_approval(actor_id, teacher_id, false).await
    }

    async fn set_teacher_approval(&self, actor_id: &str, teacher_id: &str, approved: bool) -> Result<User> {
        self.authorize(actor_id).await?;

        for _ in 0..=self.max_conflict_retries {
            let current = self
                .users
                .get(teacher_id)
                .await?
                .ok_or_else(|| PaymentError::not_found("teacher", teacher_id))?;
            if current.role != Role::Teacher {
                return Err(PaymentError::ValidationError(format!(
                    "user {teacher_id} is not a teacher"
                )));
            }

            let mut next = current.clone();
            next.teacher.get_or_insert_with(Default::default).is_approved = approved;
            next.version = current.version + 1;
            if self.users.compare_and_swap(current.version, next.clone()).await? {
                info!(teacher = teacher_id, approved, "Teacher approval changed");
                return Ok(next.public_view());
            }
        }
        Err(PaymentError::Conflict {
            entity: "user",
            key: teacher_id.to_string(),
        })
    }

    async fn authorize(&self, actor_id: &str) -> Result<User> {
        match self.users.get(actor_id).await? {
            Some(user) if user.is_admin() => Ok(user),
            _ => Err(PaymentError::Unauthorized(format!(
                "user {actor_id} is not an admin"
            ))),
        }
    }
}
