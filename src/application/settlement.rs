use crate::application::entitlements::EntitlementLedger;
use crate::application::wallet::WalletEngine;
use crate::config::SettlementConfig;
use crate::domain::grant::{GrantKey, GrantOutcome, PurchaseGrant};
use crate::domain::payment::{AttemptStatus, FailureReason, Gateway, PaymentAttempt};
use crate::domain::ports::{
    AttemptStoreHandle, CheckoutRequest, GatewayHandle, GatewayVerification, UserStoreHandle,
};
use crate::domain::user::Role;
use crate::error::{PaymentError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What `initiate` produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Initiation {
    /// A checkout is open; send the student to `redirect_url`.
    Checkout(PaymentAttempt),
    /// The lesson is free and the student was enrolled without payment.
    Free(PurchaseGrant),
}

/// Drives a purchase from checkout to settlement.
///
/// State lives only in the attempt store, so any call can be repeated, raced
/// or resumed after a restart: every transition is a compare-and-swap on the
/// attempt's version, and settlement leans on the ledger's and the wallet's
/// own idempotency.
pub struct SettlementCoordinator {
    users: UserStoreHandle,
    ledger: Arc<EntitlementLedger>,
    wallets: Arc<WalletEngine>,
    attempts: AttemptStoreHandle,
    gateways: HashMap<Gateway, GatewayHandle>,
    config: SettlementConfig,
}

impl SettlementCoordinator {
    pub fn new(
        users: UserStoreHandle,
        ledger: Arc<EntitlementLedger>,
        wallets: Arc<WalletEngine>,
        attempts: AttemptStoreHandle,
        gateways: Vec<GatewayHandle>,
        config: SettlementConfig,
    ) -> Self {
        let gateways = gateways
            .into_iter()
            .map(|gateway| (gateway.provider(), gateway))
            .collect();
        Self {
            users,
            ledger,
            wallets,
            attempts,
            gateways,
            config,
        }
    }

    pub async fn attempt(&self, reference: &str) -> Result<PaymentAttempt> {
        self.attempts
            .get(reference)
            .await?
            .ok_or_else(|| PaymentError::not_found("payment attempt", reference))
    }

    /// Opens a checkout for a paid lesson, or enrolls the student directly in a free one.
    pub async fn initiate(
        &self,
        student_id: &str,
        course_key: &str,
        lesson_id: &str,
        gateway: Gateway,
    ) -> Result<Initiation> {
        let student = self
            .users
            .get(student_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("student", student_id))?;
        if student.role != Role::Student {
            return Err(PaymentError::Unauthorized(format!(
                "user {student_id} is not a student"
            )));
        }

        let (course, lesson) = self.ledger.lesson(course_key, lesson_id).await?;

        if lesson.is_free {
            let reference = format!("free:{student_id}:{course_key}:{lesson_id}");
            let grant = self
                .ledger
                .record_grant(student_id, course_key, lesson_id, 0, &reference)
                .await?
                .into_grant();
            return Ok(Initiation::Free(grant));
        }

        if self.ledger.grant(student_id, course_key, lesson_id).await?.is_some() {
            return Err(PaymentError::AlreadyOwned {
                student: student_id.to_string(),
                course: course_key.to_string(),
                lesson: lesson_id.to_string(),
            });
        }

        let teacher_approved = self
            .users
            .get(&course.teacher_id)
            .await?
            .is_some_and(|teacher| teacher.is_approved_teacher());
        if !teacher_approved {
            return Err(PaymentError::InvalidState(format!(
                "course {course_key} belongs to a teacher who is not approved"
            )));
        }

        let now = Utc::now();
        let key = GrantKey::new(student_id, course_key, lesson_id);
        if let Some(open) = self.attempts.find_open(&key).await?.into_iter().find(|a| {
            a.gateway == gateway
                && a.status == AttemptStatus::AwaitingConfirmation
                && !a.is_expired(now, self.config.confirmation_timeout)
        }) {
            debug!(reference = %open.reference, "Reusing open checkout");
            return Ok(Initiation::Checkout(open));
        }

        let provider = self.gateway(gateway)?;
        let reference = format!("{gateway}_{}", Uuid::new_v4().simple());
        let mut attempt = PaymentAttempt::new(
            reference.clone(),
            student_id.to_string(),
            course_key.to_string(),
            lesson_id.to_string(),
            course.teacher_id.clone(),
            lesson.price,
            gateway,
            now,
        );
        attempt.version = 1;

        // Persisted before the gateway hears about it, so a crash leaves a resumable record.
        if !self.attempts.compare_and_swap(None, attempt.clone()).await? {
            return Err(PaymentError::Conflict {
                entity: "payment attempt",
                key: reference,
            });
        }
        info!(
            reference = %reference,
            student = student_id,
            course = course_key,
            lesson = lesson_id,
            amount = lesson.price,
            gateway = %gateway,
            "Payment attempt initiated"
        );

        let request = CheckoutRequest {
            reference: reference.clone(),
            email: student.email.clone(),
            amount: lesson.price,
            student_id: student_id.to_string(),
            course_key: course_key.to_string(),
            lesson_id: lesson_id.to_string(),
        };

        match timeout(self.config.gateway_call_timeout, provider.initialize(request)).await {
            Ok(Ok(checkout)) => {
                let redirect_url = checkout.redirect_url;
                let attempt = self
                    .transition(&reference, |a| a.mark_awaiting(redirect_url.clone(), Utc::now()))
                    .await?;
                info!(reference = %reference, "Awaiting payment confirmation");
                Ok(Initiation::Checkout(attempt))
            }
            Ok(Err(err)) => {
                let reason = match err {
                    PaymentError::GatewayRejected { reason, .. } => reason,
                    other => other.to_string(),
                };
                warn!(reference = %reference, reason = %reason, "Gateway rejected checkout");
                let failure = FailureReason::Rejected {
                    reason: reason.clone(),
                };
                self.transition(&reference, |a| a.mark_failed(failure.clone(), Utc::now()))
                    .await?;
                Err(PaymentError::GatewayRejected { reference, reason })
            }
            Err(_) => {
                warn!(reference = %reference, "Gateway checkout timed out");
                self.transition(&reference, |a| a.mark_failed(FailureReason::TimedOut, Utc::now()))
                    .await?;
                Err(PaymentError::GatewayTimeout { reference })
            }
        }
    }

    /// Asks the gateway about an open attempt and settles it once paid.
    ///
    /// Settled and failed attempts are answered from the store without
    /// touching the gateway. A verified attempt whose settlement did not
    /// finish is settled again.
    pub async fn verify(&self, reference: &str) -> Result<PaymentAttempt> {
        for _ in 0..=self.config.max_conflict_retries {
            let attempt = self.attempt(reference).await?;
            match attempt.status {
                AttemptStatus::Settled | AttemptStatus::Failed => return Ok(attempt),
                AttemptStatus::Verified => return Ok(self.settle_or_log(attempt).await),
                AttemptStatus::Initiated | AttemptStatus::AwaitingConfirmation => {}
            }

            let mut next = attempt.clone();
            match self.poll_gateway(&attempt).await {
                GatewayVerification::Paid {
                    amount_paid,
                    paid_at,
                } if amount_paid < attempt.amount => {
                    warn!(
                        reference,
                        expected = attempt.amount,
                        paid = amount_paid,
                        paid_at = %paid_at,
                        "Payment below lesson price"
                    );
                    next.mark_failed(
                        FailureReason::Underpaid {
                            expected: attempt.amount,
                            paid: amount_paid,
                        },
                        Utc::now(),
                    )?;
                }
                GatewayVerification::Paid {
                    amount_paid,
                    paid_at,
                } => {
                    if amount_paid > attempt.amount {
                        warn!(
                            reference,
                            expected = attempt.amount,
                            paid = amount_paid,
                            "Payment above lesson price"
                        );
                    }
                    next.mark_verified(amount_paid, paid_at, Utc::now())?;
                }
                GatewayVerification::Declined { reason } => {
                    next.mark_failed(FailureReason::Declined { reason }, Utc::now())?;
                }
                GatewayVerification::Pending => {
                    if !attempt.is_expired(Utc::now(), self.config.confirmation_timeout) {
                        return Ok(attempt);
                    }
                    next.mark_failed(FailureReason::TimedOut, Utc::now())?;
                }
            }

            let Some(stored) = self.swap(&attempt, next).await? else {
                debug!(reference, "Attempt changed underneath verify, re-reading");
                continue;
            };

            match stored.status {
                AttemptStatus::Verified => {
                    info!(reference, amount_paid = ?stored.amount_paid, "Payment verified");
                    return Ok(self.settle_or_log(stored).await);
                }
                _ => {
                    warn!(reference, failure = ?stored.failure, "Payment attempt failed");
                    return Ok(stored);
                }
            }
        }
        Err(PaymentError::Conflict {
            entity: "payment attempt",
            key: reference.to_string(),
        })
    }

    /// Grants the lesson and credits the teacher for a verified attempt.
    /// Repeating it on a settled attempt changes nothing.
    pub async fn settle(&self, reference: &str) -> Result<PaymentAttempt> {
        let attempt = self.attempt(reference).await?;
        match attempt.status {
            AttemptStatus::Settled => Ok(attempt),
            AttemptStatus::Verified => self.drive_settlement(attempt).await,
            status => Err(PaymentError::InvalidState(format!(
                "attempt {reference} is {status:?}, not verified"
            ))),
        }
    }

    /// Polls `verify` until the attempt resolves or the confirmation window closes.
    pub async fn await_confirmation(&self, reference: &str) -> Result<PaymentAttempt> {
        let window = self.config.confirmation_timeout + self.config.gateway_call_timeout;
        match timeout(window, self.poll_until_resolved(reference)).await {
            Ok(result) => result,
            Err(_) => {
                let attempt = self.abandon(reference).await?;
                match attempt.status {
                    AttemptStatus::Failed => Err(Self::failure_error(&attempt)),
                    _ => Ok(attempt),
                }
            }
        }
    }

    /// Gives up on an open attempt. Resolved attempts are returned as they are.
    pub async fn abandon(&self, reference: &str) -> Result<PaymentAttempt> {
        for _ in 0..=self.config.max_conflict_retries {
            let attempt = self.attempt(reference).await?;
            if !attempt.is_open() {
                return Ok(attempt);
            }
            let mut next = attempt.clone();
            next.mark_failed(FailureReason::Abandoned, Utc::now())?;
            if let Some(stored) = self.swap(&attempt, next).await? {
                warn!(reference, "Payment attempt abandoned");
                return Ok(stored);
            }
        }
        Err(PaymentError::Conflict {
            entity: "payment attempt",
            key: reference.to_string(),
        })
    }

    /// Re-verifies every attempt left unresolved, e.g. after a restart.
    pub async fn resume_unresolved(&self) -> Result<Vec<PaymentAttempt>> {
        let pending = self.attempts.unresolved().await?;
        info!(count = pending.len(), "Resuming unresolved payment attempts");

        let mut resumed = Vec::with_capacity(pending.len());
        for attempt in pending {
            match self.verify(&attempt.reference).await {
                Ok(attempt) => resumed.push(attempt),
                Err(err) => warn!(reference = %attempt.reference, error = %err, "Could not resume attempt"),
            }
        }
        Ok(resumed)
    }

    async fn poll_until_resolved(&self, reference: &str) -> Result<PaymentAttempt> {
        loop {
            let attempt = self.verify(reference).await?;
            match attempt.status {
                AttemptStatus::Settled => return Ok(attempt),
                AttemptStatus::Failed => return Err(Self::failure_error(&attempt)),
                AttemptStatus::Initiated
                | AttemptStatus::AwaitingConfirmation
                | AttemptStatus::Verified => {
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    async fn settle_or_log(&self, attempt: PaymentAttempt) -> PaymentAttempt {
        let reference = attempt.reference.clone();
        match self.drive_settlement(attempt.clone()).await {
            Ok(settled) => settled,
            Err(err) => {
                error!(
                    reference = %reference,
                    error = %err,
                    "Settlement incomplete, will retry on next verify"
                );
                self.attempts
                    .get(&reference)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or(attempt)
            }
        }
    }

    async fn drive_settlement(&self, attempt: PaymentAttempt) -> Result<PaymentAttempt> {
        let amount_paid = attempt.amount_paid.unwrap_or(attempt.amount);
        let outcome = self
            .ledger
            .record_grant(
                &attempt.student_id,
                &attempt.course_key,
                &attempt.lesson_id,
                amount_paid,
                &attempt.reference,
            )
            .await?;

        let duplicate_of = match outcome {
            GrantOutcome::AlreadyGranted(existing) if existing.reference != attempt.reference => {
                warn!(
                    reference = %attempt.reference,
                    owner_reference = %existing.reference,
                    "Lesson was already bought under another payment, no credit issued"
                );
                Some(existing.reference)
            }
            GrantOutcome::Created(_) | GrantOutcome::AlreadyGranted(_) => {
                let description = format!(
                    "Sale of lesson {} in {}",
                    attempt.lesson_id, attempt.course_key
                );
                self.wallets
                    .credit_sale(
                        &attempt.teacher_id,
                        amount_paid,
                        &description,
                        &attempt.reference,
                    )
                    .await?;
                None
            }
        };

        let mut current = attempt;
        for _ in 0..=self.config.max_conflict_retries {
            if current.status == AttemptStatus::Settled {
                return Ok(current);
            }
            let mut next = current.clone();
            next.mark_settled(duplicate_of.clone(), Utc::now())?;
            if let Some(stored) = self.swap(&current, next).await? {
                info!(reference = %stored.reference, "Payment settled");
                return Ok(stored);
            }
            current = self.attempt(&current.reference).await?;
        }
        Err(PaymentError::Conflict {
            entity: "payment attempt",
            key: current.reference,
        })
    }

    async fn poll_gateway(&self, attempt: &PaymentAttempt) -> GatewayVerification {
        let gateway = match self.gateway(attempt.gateway) {
            Ok(gateway) => gateway,
            Err(err) => {
                warn!(reference = %attempt.reference, error = %err, "No gateway to verify with");
                return GatewayVerification::Pending;
            }
        };
        match timeout(
            self.config.gateway_call_timeout,
            gateway.verify(&attempt.reference),
        )
        .await
        {
            Ok(Ok(verification)) => verification,
            Ok(Err(err)) => {
                warn!(reference = %attempt.reference, error = %err, "Gateway verify failed");
                GatewayVerification::Pending
            }
            Err(_) => {
                warn!(reference = %attempt.reference, "Gateway verify timed out");
                GatewayVerification::Pending
            }
        }
    }

    /// Applies a transition, re-reading and retrying when another writer got there first.
    async fn transition<F>(&self, reference: &str, apply: F) -> Result<PaymentAttempt>
    where
        F: Fn(&mut PaymentAttempt) -> Result<()> + Send + Sync,
    {
        for _ in 0..=self.config.max_conflict_retries {
            let current = self.attempt(reference).await?;
            let mut next = current.clone();
            apply(&mut next)?;
            if let Some(stored) = self.swap(&current, next).await? {
                return Ok(stored);
            }
        }
        Err(PaymentError::Conflict {
            entity: "payment attempt",
            key: reference.to_string(),
        })
    }

    async fn swap(
        &self,
        current: &PaymentAttempt,
        mut next: PaymentAttempt,
    ) -> Result<Option<PaymentAttempt>> {
        next.version = current.version + 1;
        if self
            .attempts
            .compare_and_swap(Some(current.version), next.clone())
            .await?
        {
            Ok(Some(next))
        } else {
            Ok(None)
        }
    }

    fn gateway(&self, gateway: Gateway) -> Result<&GatewayHandle> {
        self.gateways.get(&gateway).ok_or_else(|| {
            PaymentError::ValidationError(format!("gateway {gateway} is not configured"))
        })
    }

    fn failure_error(attempt: &PaymentAttempt) -> PaymentError {
        match &attempt.failure {
            Some(FailureReason::TimedOut) | Some(FailureReason::Abandoned) | None => {
                PaymentError::GatewayTimeout {
                    reference: attempt.reference.clone(),
                }
            }
            Some(reason) => PaymentError::GatewayRejected {
                reference: attempt.reference.clone(),
                reason: reason.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::wallet::PlatformFee;
    use crate::domain::catalog::{Course, Lesson};
    use crate::domain::ports::Stores;
    use crate::domain::user::{TeacherProfile, User};
    use crate::infrastructure::gateway::{SimulatedBehavior, SimulatedGateway};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Fixture {
        coordinator: SettlementCoordinator,
        gateway: SimulatedGateway,
        wallets: Arc<WalletEngine>,
        ledger: Arc<EntitlementLedger>,
    }

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            role,
            email: format!("{id}@example.test"),
            name: id.to_string(),
            credential_hash: String::new(),
            email_confirmed: true,
            teacher: (role == Role::Teacher).then(|| TeacherProfile {
                is_approved: true,
                whatsapp: None,
            }),
            created_at: Utc::now(),
            version: 1,
        }
    }

    async fn fixture(config: SettlementConfig) -> Fixture {
        let stores = Stores::in_memory();
        stores.users.insert(user("s1", Role::Student)).await.unwrap();
        stores.users.insert(user("s2", Role::Student)).await.unwrap();
        stores.users.insert(user("t1", Role::Teacher)).await.unwrap();

        let mut course = Course::new("math101", "t1");
        course.upsert_lesson(Lesson::free("intro")).unwrap();
        course.upsert_lesson(Lesson::paid("vectors", 1500)).unwrap();
        stores.courses.store(course).await.unwrap();

        let ledger = Arc::new(EntitlementLedger::new(
            stores.courses.clone(),
            stores.grants.clone(),
        ));
        let wallets = Arc::new(WalletEngine::new(
            stores.wallets.clone(),
            PlatformFee::new(config.platform_fee_percent).unwrap(),
            config.max_conflict_retries,
        ));
        let gateway = SimulatedGateway::new(Gateway::Paystack, "https://pay.test");
        let coordinator = SettlementCoordinator::new(
            stores.users.clone(),
            ledger.clone(),
            wallets.clone(),
            stores.attempts.clone(),
            vec![Arc::new(gateway.clone())],
            config,
        );
        Fixture {
            coordinator,
            gateway,
            wallets,
            ledger,
        }
    }

    fn fast_config() -> SettlementConfig {
        SettlementConfig {
            confirmation_timeout: Duration::from_millis(300),
            gateway_call_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            ..SettlementConfig::default()
        }
    }

    async fn checkout(f: &Fixture, student: &str) -> PaymentAttempt {
        match f
            .coordinator
            .initiate(student, "math101", "vectors", Gateway::Paystack)
            .await
            .unwrap()
        {
            Initiation::Checkout(attempt) => attempt,
            other => panic!("expected checkout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_initiate_persists_awaiting_attempt() {
        let f = fixture(fast_config()).await;
        let attempt = checkout(&f, "s1").await;

        assert_eq!(attempt.status, AttemptStatus::AwaitingConfirmation);
        assert!(attempt.reference.starts_with("paystack_"));
        assert_eq!(
            attempt.redirect_url.as_deref(),
            Some(format!("https://pay.test/paystack/{}", attempt.reference).as_str())
        );
        assert_eq!(f.coordinator.attempt(&attempt.reference).await.unwrap(), attempt);
    }

    #[tokio::test]
    async fn test_verify_settles_and_credits_once() {
        let f = fixture(fast_config()).await;
        let attempt = checkout(&f, "s1").await;

        let settled = f.coordinator.verify(&attempt.reference).await.unwrap();
        assert_eq!(settled.status, AttemptStatus::Settled);
        assert!(f.ledger.has_access("s1", "math101", "vectors").await.unwrap());

        let again = f.coordinator.verify(&attempt.reference).await.unwrap();
        assert_eq!(again, settled);
        assert_eq!(f.gateway.verify_calls(), 1);

        let wallet = f.wallets.wallet("t1").await.unwrap();
        assert_eq!(wallet.balance.value(), dec!(1350));
        assert_eq!(wallet.transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_free_lesson_skips_gateway() {
        let f = fixture(fast_config()).await;
        let initiation = f
            .coordinator
            .initiate("s1", "math101", "intro", Gateway::Paystack)
            .await
            .unwrap();

        match initiation {
            Initiation::Free(grant) => assert_eq!(grant.amount_paid, 0),
            other => panic!("expected free enrollment, got {other:?}"),
        }
        assert_eq!(f.wallets.wallet("t1").await.unwrap().balance.value(), dec!(0));
    }

    #[tokio::test]
    async fn test_owned_lesson_is_rejected_before_checkout() {
        let f = fixture(fast_config()).await;
        let attempt = checkout(&f, "s1").await;
        f.coordinator.verify(&attempt.reference).await.unwrap();

        assert!(matches!(
            f.coordinator
                .initiate("s1", "math101", "vectors", Gateway::Paystack)
                .await,
            Err(PaymentError::AlreadyOwned { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_checkout_is_reused() {
        let f = fixture(fast_config()).await;
        f.gateway.script_next(SimulatedBehavior::NeverConfirm).await;
        let first = checkout(&f, "s1").await;
        let second = checkout(&f, "s1").await;
        assert_eq!(first.reference, second.reference);
    }

    #[tokio::test]
    async fn test_underpayment_fails_without_grant() {
        let f = fixture(fast_config()).await;
        f.gateway.script_next(SimulatedBehavior::PayAmount(1000)).await;
        let attempt = checkout(&f, "s1").await;

        let failed = f.coordinator.verify(&attempt.reference).await.unwrap();
        assert_eq!(failed.status, AttemptStatus::Failed);
        assert_eq!(
            failed.failure,
            Some(FailureReason::Underpaid {
                expected: 1500,
                paid: 1000
            })
        );
        assert!(!f.ledger.has_access("s1", "math101", "vectors").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_checkout_is_recorded() {
        let f = fixture(fast_config()).await;
        f.gateway
            .script_next(SimulatedBehavior::RejectCheckout("maintenance".into()))
            .await;

        let err = f
            .coordinator
            .initiate("s1", "math101", "vectors", Gateway::Paystack)
            .await
            .unwrap_err();
        let PaymentError::GatewayRejected { reference, reason } = err else {
            panic!("expected GatewayRejected");
        };
        assert_eq!(reason, "maintenance");
        let attempt = f.coordinator.attempt(&reference).await.unwrap();
        assert_eq!(attempt.status, AttemptStatus::Failed);
    }

    #[tokio::test]
    async fn test_await_confirmation_times_out() {
        let f = fixture(fast_config()).await;
        f.gateway.script_next(SimulatedBehavior::NeverConfirm).await;
        let attempt = checkout(&f, "s1").await;

        let result = f.coordinator.await_confirmation(&attempt.reference).await;
        assert!(matches!(result, Err(PaymentError::GatewayTimeout { .. })));

        let stored = f.coordinator.attempt(&attempt.reference).await.unwrap();
        assert_eq!(stored.status, AttemptStatus::Failed);
        assert!(!f.ledger.has_access("s1", "math101", "vectors").await.unwrap());
    }

    #[tokio::test]
    async fn test_await_confirmation_after_pending_polls() {
        let f = fixture(fast_config()).await;
        f.gateway.script_next(SimulatedBehavior::ConfirmAfter(3)).await;
        let attempt = checkout(&f, "s1").await;

        let settled = f.coordinator.await_confirmation(&attempt.reference).await.unwrap();
        assert_eq!(settled.status, AttemptStatus::Settled);
        assert_eq!(f.gateway.verify_calls(), 4);
    }

    #[tokio::test]
    async fn test_declined_payment_reports_reason() {
        let f = fixture(fast_config()).await;
        f.gateway
            .script_next(SimulatedBehavior::Decline("card expired".into()))
            .await;
        let attempt = checkout(&f, "s1").await;

        match f.coordinator.await_confirmation(&attempt.reference).await {
            Err(PaymentError::GatewayRejected { reason, .. }) => {
                assert!(reason.contains("card expired"))
            }
            other => panic!("expected GatewayRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_abandon_leaves_resolved_attempts_alone() {
        let f = fixture(fast_config()).await;
        let attempt = checkout(&f, "s1").await;
        f.coordinator.verify(&attempt.reference).await.unwrap();

        let after = f.coordinator.abandon(&attempt.reference).await.unwrap();
        assert_eq!(after.status, AttemptStatus::Settled);
    }

    #[tokio::test]
    async fn test_settle_rejects_open_attempt() {
        let f = fixture(fast_config()).await;
        f.gateway.script_next(SimulatedBehavior::NeverConfirm).await;
        let attempt = checkout(&f, "s1").await;
        assert!(matches!(
            f.coordinator.settle(&attempt.reference).await,
            Err(PaymentError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_teacher_cannot_buy() {
        let f = fixture(fast_config()).await;
        assert!(matches!(
            f.coordinator
                .initiate("t1", "math101", "vectors", Gateway::Paystack)
                .await,
            Err(PaymentError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_gateway() {
        let f = fixture(fast_config()).await;
        assert!(matches!(
            f.coordinator
                .initiate("s1", "math101", "vectors", Gateway::Flutterwave)
                .await,
            Err(PaymentError::ValidationError(_))
        ));
    }
}
