pub mod plaid;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::core::Transaction;

#[async_trait]
pub trait TransactionSource {
    /// Every transaction dated between `start` and `end`, both inclusive.
    async fn transactions(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Transaction>>;
}
