use std::io::Write;

use anyhow::Result;
use tabwriter::TabWriter;

use crate::core::{Status, Transaction};
use crate::render::format_amount;
use crate::spending::Spending;

pub fn print_totals<T: Write>(wr: T, spending: &Spending) -> Result<()> {
    let mut tw = TabWriter::new(wr);
    writeln!(tw, "Window\tTotal\tExact")?;

    for (window, amount) in [
        ("Day", spending.day),
        ("Week", spending.week),
        ("Month", spending.month),
    ] {
        writeln!(tw, "{}\t{}\t{:.2}", window, format_amount(amount), amount)?;
    }

    tw.flush()?;

    Ok(())
}

pub fn print_transactions<T: Write>(wr: T, txns: &[&Transaction]) -> Result<()> {
    let mut tw = TabWriter::new(wr);
    writeln!(tw, "Date\t\tPayee\tCategory\tAmount")?;

    for txn in txns {
        let status = match txn.status {
            Status::Pending => "!",
            Status::Resolved => "*",
        };
        writeln!(
            tw,
            "{}\t{}\t{}\t{}\t${:.2}",
            txn.date,
            status,
            txn.payee(),
            txn.category.join(" > "),
            txn.amount,
        )?;
    }

    tw.flush()?;

    Ok(())
}
