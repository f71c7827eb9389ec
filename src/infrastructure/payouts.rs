use crate::domain::ports::PayoutDispatcher;
use crate::domain::user::User;
use crate::domain::wallet::WalletTransaction;
use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// Records approved withdrawals in the log; the bank transfer happens elsewhere.
#[derive(Debug, Default, Clone)]
pub struct LoggingPayouts;

#[async_trait]
impl PayoutDispatcher for LoggingPayouts {
    async fn dispatch(&self, teacher: &User, transaction: &WalletTransaction) -> Result<()> {
        let bank = transaction.bank_details.as_ref();
        info!(
            teacher = %teacher.id,
            transaction = %transaction.id,
            amount = %transaction.amount,
            bank = bank.map(|b| b.bank_name.as_str()).unwrap_or("-"),
            account = bank.map(|b| b.account_number.as_str()).unwrap_or("-"),
            "Payout queued"
        );
        Ok(())
    }
}
