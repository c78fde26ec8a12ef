mod txn;

pub use txn::{Status, Transaction};
