use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One scripted platform event.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptOp {
    Student,
    Teacher,
    Admin,
    ApproveTeacher,
    DismissTeacher,
    Course,
    Lesson,
    Purchase,
    Withdraw,
    Approve,
    Reject,
}

/// A row of `op,user,target,lesson,amount`. Unused columns may be left empty.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ScriptEvent {
    pub op: ScriptOp,
    pub user: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub lesson: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

impl ScriptEvent {
    pub fn target(&self) -> Result<&str> {
        required(self.target.as_deref(), "target", self.op)
    }

    pub fn lesson(&self) -> Result<&str> {
        required(self.lesson.as_deref(), "lesson", self.op)
    }

    pub fn amount(&self) -> Result<Decimal> {
        self.amount.ok_or_else(|| {
            PaymentError::ValidationError(format!("{:?} needs an amount", self.op))
        })
    }
}

fn required<'a>(value: Option<&'a str>, column: &str, op: ScriptOp) -> Result<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PaymentError::ValidationError(format!("{op:?} needs a {column} column")))
}

/// Reads script events from a CSV source, trimming whitespace and tolerating short rows.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes events; a malformed row yields an error and reading continues.
    pub fn events(self) -> impl Iterator<Item = Result<ScriptEvent>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "op, user, target, lesson, amount\n\
                    teacher, ada,,,\n\
                    lesson, ada, math101, vectors, 1500\n\
                    withdraw, ada,,, 99.50";
        let events: Vec<Result<ScriptEvent>> = EventReader::new(data.as_bytes()).events().collect();

        assert_eq!(events.len(), 3);
        let teacher = events[0].as_ref().unwrap();
        assert_eq!(teacher.op, ScriptOp::Teacher);
        assert_eq!(teacher.target, None);

        let lesson = events[1].as_ref().unwrap();
        assert_eq!(lesson.target().unwrap(), "math101");
        assert_eq!(lesson.lesson().unwrap(), "vectors");
        assert_eq!(lesson.amount, Some(dec!(1500)));

        assert_eq!(events[2].as_ref().unwrap().amount().unwrap(), dec!(99.50));
    }

    #[test]
    fn test_short_rows_are_accepted() {
        let data = "op,user,target,lesson,amount\nstudent,bola";
        let events: Vec<Result<ScriptEvent>> = EventReader::new(data.as_bytes()).events().collect();
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.user, "bola");
        assert!(event.target().is_err());
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "op,user,target,lesson,amount\nrefund,bola,,,\npurchase,bola,math101,vectors,abc";
        let events: Vec<Result<ScriptEvent>> = EventReader::new(data.as_bytes()).events().collect();
        assert!(events[0].is_err());
        assert!(events[1].is_err());
    }
}
