use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::info;

use crate::core::{Status, Transaction};
use crate::plaid::{self, Plaid};
use crate::upstream::TransactionSource;

pub struct Source<'a> {
    client: &'a Plaid,
}

impl<'a> Source<'a> {
    pub fn new(client: &'a Plaid) -> Self {
        Self { client }
    }
}

fn to_canonical_txn(tx: plaid::Transaction) -> Transaction {
    Transaction {
        id: tx.transaction_id,
        date: tx.date,
        amount: tx.amount,
        category: tx.category.unwrap_or_default(),
        merchant: tx.merchant_name.filter(|m| !m.is_empty()),
        narration: tx.name,
        status: if tx.pending {
            Status::Pending
        } else {
            Status::Resolved
        },
    }
}

#[async_trait]
impl<'a> TransactionSource for Source<'a> {
    #[tracing::instrument(skip(self))]
    async fn transactions(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Transaction>> {
        let txns = self.client.transactions(start, end).await?;
        info!("Fetched {} transactions from plaid.", txns.len());

        Ok(txns.into_iter().map(to_canonical_txn).collect())
    }
}
