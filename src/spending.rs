//! Daily, weekly and monthly spending totals.

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::core::Transaction;

pub const DEFAULT_EXCLUDED_CATEGORIES: [&str; 6] = [
    "Transfer",
    "Deposit",
    "Payment",
    "Bank Fees",
    "Interest",
    "Tax",
];

/// Category labels that mark a transaction as non-spending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionSet(Vec<String>);

impl ExclusionSet {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    /// True when any level of the category hierarchy contains an excluded label.
    pub fn excludes(&self, category: &[String]) -> bool {
        category
            .iter()
            .any(|level| self.0.iter().any(|label| level.contains(label.as_str())))
    }
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_CATEGORIES)
    }
}

/// Which dates count as "this week".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekWindow {
    /// The seven days before today plus today.
    #[default]
    Rolling,
    /// Monday of the current week through today.
    Calendar,
}

impl WeekWindow {
    pub fn start(&self, today: NaiveDate) -> NaiveDate {
        match self {
            WeekWindow::Rolling => today - Duration::days(7),
            WeekWindow::Calendar => {
                today - Duration::days(today.weekday().num_days_from_monday() as i64)
            }
        }
    }
}

pub fn month_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(today.day0() as i64)
}

/// Whether a transaction is spending at all: positive amounts only, outside
/// the excluded categories.
pub fn is_spending(txn: &Transaction, exclusions: &ExclusionSet) -> bool {
    txn.amount > Decimal::ZERO && !exclusions.excludes(&txn.category)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Spending {
    pub day: Decimal,
    pub week: Decimal,
    pub month: Decimal,
}

impl Spending {
    pub fn calculate(
        txns: &[Transaction],
        exclusions: &ExclusionSet,
        today: NaiveDate,
        week: WeekWindow,
    ) -> Self {
        let week_start = week.start(today);
        let month_start = month_start(today);

        txns.iter()
            .filter(|txn| txn.date <= today)
            .filter(|txn| is_spending(txn, exclusions))
            .fold(Spending::default(), |mut acc, txn| {
                if txn.date == today {
                    acc.day += txn.amount;
                }
                if txn.date >= week_start {
                    acc.week += txn.amount;
                }
                if txn.date >= month_start {
                    acc.month += txn.amount;
                }
                acc
            })
    }

    /// Fixed figures used when no upstream credentials are configured.
    pub fn sample() -> Self {
        Self {
            day: Decimal::from(42),
            week: Decimal::from(412),
            month: Decimal::from(2847),
        }
    }
}

/// Transactions contributing to any of the totals, newest first.
pub fn contributing<'a>(
    txns: &'a [Transaction],
    exclusions: &ExclusionSet,
    today: NaiveDate,
    week: WeekWindow,
) -> Vec<&'a Transaction> {
    let earliest = month_start(today).min(week.start(today));
    let mut out: Vec<&Transaction> = txns
        .iter()
        .filter(|txn| txn.date >= earliest && txn.date <= today)
        .filter(|txn| is_spending(txn, exclusions))
        .collect();
    out.sort_by(|a, b| b.date.cmp(&a.date));
    out
}
