use crate::domain::{CourseKey, LessonId, Reference, TeacherId, UserId};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Gateway {
    Paystack,
    Flutterwave,
    BankTransfer,
}

impl Gateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gateway::Paystack => "paystack",
            Gateway::Flutterwave => "flutterwave",
            Gateway::BankTransfer => "bank_transfer",
        }
    }
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Initiated,
    AwaitingConfirmation,
    Verified,
    Settled,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The gateway refused to open a checkout.
    Rejected { reason: String },
    /// The customer's payment was declined.
    Declined { reason: String },
    TimedOut,
    Underpaid { expected: u64, paid: u64 },
    Abandoned,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Rejected { reason } => write!(f, "checkout rejected: {reason}"),
            FailureReason::Declined { reason } => write!(f, "payment declined: {reason}"),
            FailureReason::TimedOut => f.write_str("confirmation timed out"),
            FailureReason::Underpaid { expected, paid } => {
                write!(f, "underpaid: expected {expected}, received {paid}")
            }
            FailureReason::Abandoned => f.write_str("abandoned"),
        }
    }
}

/// One purchase attempt, persisted under its reference until resolved.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAttempt {
    pub reference: Reference,
    pub student_id: UserId,
    pub course_key: CourseKey,
    pub lesson_id: LessonId,
    pub teacher_id: TeacherId,
    pub amount: u64,
    pub gateway: Gateway,
    pub status: AttemptStatus,
    pub redirect_url: Option<String>,
    pub amount_paid: Option<u64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failure: Option<FailureReason>,
    /// Set when another reference already owned the lesson at settlement.
    pub duplicate_of: Option<Reference>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl PaymentAttempt {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reference: Reference,
        student_id: UserId,
        course_key: CourseKey,
        lesson_id: LessonId,
        teacher_id: TeacherId,
        amount: u64,
        gateway: Gateway,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            reference,
            student_id,
            course_key,
            lesson_id,
            teacher_id,
            amount,
            gateway,
            status: AttemptStatus::Initiated,
            redirect_url: None,
            amount_paid: None,
            paid_at: None,
            failure: None,
            duplicate_of: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Settled and failed attempts never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, AttemptStatus::Settled | AttemptStatus::Failed)
    }

    /// Still waiting on the gateway.
    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            AttemptStatus::Initiated | AttemptStatus::AwaitingConfirmation
        )
    }

    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let elapsed = now.signed_duration_since(self.created_at);
        elapsed.to_std().map(|e| e >= timeout).unwrap_or(false)
    }

    pub fn mark_awaiting(&mut self, redirect_url: String, now: DateTime<Utc>) -> Result<()> {
        self.expect(AttemptStatus::Initiated, "await confirmation")?;
        self.status = AttemptStatus::AwaitingConfirmation;
        self.redirect_url = Some(redirect_url);
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_verified(
        &mut self,
        amount_paid: u64,
        paid_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.is_open() {
            return Err(self.illegal("verify"));
        }
        self.status = AttemptStatus::Verified;
        self.amount_paid = Some(amount_paid);
        self.paid_at = Some(paid_at);
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: FailureReason, now: DateTime<Utc>) -> Result<()> {
        if !self.is_open() {
            return Err(self.illegal("fail"));
        }
        self.status = AttemptStatus::Failed;
        self.failure = Some(reason);
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_settled(&mut self, duplicate_of: Option<Reference>, now: DateTime<Utc>) -> Result<()> {
        self.expect(AttemptStatus::Verified, "settle")?;
        self.status = AttemptStatus::Settled;
        self.duplicate_of = duplicate_of;
        self.updated_at = now;
        Ok(())
    }

    fn expect(&self, status: AttemptStatus, action: &str) -> Result<()> {
        if self.status == status {
            Ok(())
        } else {
            Err(self.illegal(action))
        }
    }

    fn illegal(&self, action: &str) -> PaymentError {
        PaymentError::InvalidState(format!(
            "cannot {action} attempt {} in state {:?}",
            self.reference, self.status
        ))
    }
}
