use std::fmt;

use chrono::naive::NaiveDate;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Resolved,
    Pending,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Resolved => f.write_str("RESOLVED"),
            Status::Pending => f.write_str("PENDING"),
        }
    }
}

/// A single ledger entry as reported by the upstream source.
///
/// `amount` keeps the upstream sign convention: positive values are money
/// leaving the account, negative values are credits.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    /// Category hierarchy, most general label first. May be empty.
    pub category: Vec<String>,
    pub merchant: Option<String>,
    pub narration: String,
    pub status: Status,
}

impl Transaction {
    /// Merchant name when the upstream resolved one, the raw description otherwise.
    pub fn payee(&self) -> &str {
        self.merchant.as_deref().unwrap_or(&self.narration)
    }
}
