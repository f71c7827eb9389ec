use crate::domain::wallet::TeacherWallet;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// One line of the wallet statement printed after a replay.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct WalletStatement {
    pub teacher: String,
    pub balance: String,
    pub pending: String,
    pub earnings: String,
    pub withdrawn: String,
}

impl WalletStatement {
    pub fn new(teacher_name: impl Into<String>, wallet: &TeacherWallet) -> Self {
        Self {
            teacher: teacher_name.into(),
            balance: wallet.balance.to_string(),
            pending: wallet.pending_withdrawals.to_string(),
            earnings: wallet.total_earnings.to_string(),
            withdrawn: wallet.completed_withdrawals.to_string(),
        }
    }
}

pub struct WalletWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> WalletWriter<W> {
    pub fn new(sink: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(sink);
        Self { writer }
    }

    /// Writes the header even when there is nothing to report.
    pub fn write_statements(&mut self, statements: impl IntoIterator<Item = WalletStatement>) -> Result<()> {
        self.writer
            .write_record(["teacher", "balance", "pending", "earnings", "withdrawn"])?;
        for statement in statements {
            self.writer.serialize(statement)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::wallet::{Amount, BankDetails};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_statement_output() {
        let mut wallet = TeacherWallet::new("t1");
        wallet.credit(Amount::new(dec!(1350.00)).unwrap(), "sale", None, None, Utc::now());
        wallet
            .reserve_withdrawal(
                Amount::new(dec!(100.50)).unwrap(),
                BankDetails {
                    bank_name: "GTBank".into(),
                    account_number: "0123456789".into(),
                    account_name: "Ada".into(),
                },
                Utc::now(),
            )
            .unwrap();

        let mut out = Vec::new();
        WalletWriter::new(&mut out)
            .write_statements([WalletStatement::new("Ada", &wallet)])
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "teacher,balance,pending,earnings,withdrawn\nAda,1249.5,100.5,1350,0\n"
        );
    }

    #[test]
    fn test_empty_statement_keeps_header() {
        let mut out = Vec::new();
        WalletWriter::new(&mut out)
            .write_statements(Vec::<WalletStatement>::new())
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "teacher,balance,pending,earnings,withdrawn\n"
        );
    }
}
