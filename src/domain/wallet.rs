use crate::domain::TeacherId;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use uuid::Uuid;

/// A running wallet figure, in Naira with kobo precision.
///
/// Wraps `rust_decimal::Decimal` so that balances cannot be confused with
/// raw prices or with validated transaction amounts.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// A strictly positive money amount carried by a wallet transaction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Rejected,
}

/// Admin decision on a pending withdrawal.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalOutcome {
    Approve,
    Reject,
}

/// Destination account for a withdrawal.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
}

impl BankDetails {
    pub fn validate(&self) -> Result<()> {
        if self.bank_name.trim().is_empty() || self.account_name.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "bank name and account name are required".to_string(),
            ));
        }
        if self.account_number.is_empty() || !self.account_number.chars().all(|c| c.is_ascii_digit())
        {
            return Err(PaymentError::ValidationError(format!(
                "account number '{}' must be digits only",
                self.account_number
            )));
        }
        Ok(())
    }
}

/// Platform cut of a lesson sale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub gross: Balance,
    pub teacher_share: Balance,
    pub platform_share: Balance,
}

/// One entry in a wallet's append-only log.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub status: TransactionStatus,
    pub description: String,
    pub date: DateTime<Utc>,
    /// Payment reference that produced a credit.
    pub reference: Option<String>,
    pub bank_details: Option<BankDetails>,
    pub gross_amount: Option<Balance>,
    pub platform_fee: Option<Balance>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl WalletTransaction {
    pub fn is_pending_debit(&self) -> bool {
        self.kind == TransactionKind::Debit && self.status == TransactionStatus::Pending
    }
}

/// A teacher's earnings ledger.
///
/// `balance` is withdrawable, `pending_withdrawals` is reserved by requests that
/// an admin has not resolved yet, and `completed_withdrawals` has left the
/// platform. Their sum always equals `total_earnings`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TeacherWallet {
    pub teacher_id: TeacherId,
    pub balance: Balance,
    pub total_earnings: Balance,
    pub pending_withdrawals: Balance,
    pub completed_withdrawals: Balance,
    pub transactions: Vec<WalletTransaction>,
    /// Bumped on every stored write; used for compare-and-swap.
    pub version: u64,
}

impl TeacherWallet {
    pub fn new(teacher_id: impl Into<TeacherId>) -> Self {
        Self {
            teacher_id: teacher_id.into(),
            balance: Balance::ZERO,
            total_earnings: Balance::ZERO,
            pending_withdrawals: Balance::ZERO,
            completed_withdrawals: Balance::ZERO,
            transactions: Vec::new(),
            version: 0,
        }
    }

    pub fn credit_for(&self, reference: &str) -> Option<&WalletTransaction> {
        self.transactions.iter().find(|tx| {
            tx.kind == TransactionKind::Credit && tx.reference.as_deref() == Some(reference)
        })
    }

    pub fn transaction(&self, tx_id: Uuid) -> Option<&WalletTransaction> {
        self.transactions.iter().find(|tx| tx.id == tx_id)
    }

    /// Appends a completed credit and grows the withdrawable balance.
    pub fn credit(
        &mut self,
        amount: Amount,
        description: impl Into<String>,
        reference: Option<String>,
        fee: Option<FeeSplit>,
        now: DateTime<Utc>,
    ) -> WalletTransaction {
        self.balance += amount.into();
        self.total_earnings += amount.into();

        let tx = WalletTransaction {
            id: Uuid::new_v4(),
            kind: TransactionKind::Credit,
            amount,
            status: TransactionStatus::Completed,
            description: description.into(),
            date: now,
            reference,
            bank_details: None,
            gross_amount: fee.map(|f| f.gross),
            platform_fee: fee.map(|f| f.platform_share),
            resolved_at: Some(now),
        };
        self.transactions.push(tx.clone());
        tx
    }

    /// Moves funds from the balance into the pending bucket.
    pub fn reserve_withdrawal(
        &mut self,
        amount: Amount,
        bank_details: BankDetails,
        now: DateTime<Utc>,
    ) -> Result<WalletTransaction> {
        let requested = Balance::from(amount);
        if requested > self.balance {
            return Err(PaymentError::InsufficientFunds {
                balance: self.balance.value(),
                requested: amount.value(),
            });
        }

        self.balance -= requested;
        self.pending_withdrawals += requested;

        let tx = WalletTransaction {
            id: Uuid::new_v4(),
            kind: TransactionKind::Debit,
            amount,
            status: TransactionStatus::Pending,
            description: format!(
                "Withdrawal to {} ({})",
                bank_details.bank_name, bank_details.account_number
            ),
            date: now,
            reference: None,
            bank_details: Some(bank_details),
            gross_amount: None,
            platform_fee: None,
            resolved_at: None,
        };
        self.transactions.push(tx.clone());
        Ok(tx)
    }

    /// Finalizes or reverses a pending withdrawal. Terminal transactions cannot move again.
    pub fn resolve_withdrawal(
        &mut self,
        tx_id: Uuid,
        outcome: WithdrawalOutcome,
        now: DateTime<Utc>,
    ) -> Result<WalletTransaction> {
        let position = self
            .transactions
            .iter()
            .position(|tx| tx.id == tx_id)
            .ok_or_else(|| PaymentError::not_found("wallet transaction", tx_id.to_string()))?;

        let tx = &self.transactions[position];
        if tx.kind != TransactionKind::Debit {
            return Err(PaymentError::InvalidState(format!(
                "transaction {tx_id} is a credit, not a withdrawal"
            )));
        }
        if tx.status != TransactionStatus::Pending {
            return Err(PaymentError::InvalidState(format!(
                "withdrawal {tx_id} is already {:?}",
                tx.status
            )));
        }

        let amount = Balance::from(tx.amount);
        if self.pending_withdrawals < amount {
            return Err(PaymentError::InvalidState(format!(
                "pending withdrawals {} do not cover {}",
                self.pending_withdrawals, amount
            )));
        }

        self.pending_withdrawals -= amount;
        let status = match outcome {
            WithdrawalOutcome::Approve => {
                self.completed_withdrawals += amount;
                TransactionStatus::Completed
            }
            WithdrawalOutcome::Reject => {
                self.balance += amount;
                TransactionStatus::Rejected
            }
        };

        let tx = &mut self.transactions[position];
        tx.status = status;
        tx.resolved_at = Some(now);
        Ok(tx.clone())
    }

    /// Checks the ledger identity and sign constraints.
    pub fn check_invariants(&self) -> Result<()> {
        if self.balance < Balance::ZERO || self.pending_withdrawals < Balance::ZERO {
            return Err(PaymentError::InvalidState(format!(
                "wallet {} went negative",
                self.teacher_id
            )));
        }
        let accounted = self.balance + self.pending_withdrawals + self.completed_withdrawals;
        if accounted != self.total_earnings {
            return Err(PaymentError::InvalidState(format!(
                "wallet {} does not balance: {} accounted vs {} earned",
                self.teacher_id, accounted, self.total_earnings
            )));
        }
        Ok(())
    }

    pub fn platform_fees(&self) -> Balance {
        self.transactions
            .iter()
            .filter_map(|tx| tx.platform_fee)
            .fold(Balance::ZERO, |acc, fee| acc + fee)
    }
}
