use crate::ledger::Ledger;
use std::io::{self, Write};

pub const LEDGER_CSV_HEADER: &str =
    "id,kind,date,amount,impact,balance_before,balance_after,description";

/// Write `ledger` as CSV, newest entry first.
pub fn write_ledger_csv<W: Write>(ledger: &Ledger, mut out: W) -> io::Result<()> {
    writeln!(out, "{LEDGER_CSV_HEADER}")?;
    for entry in &ledger.entries {
        let op = &entry.operation;
        let date = op
            .effective_date()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        writeln!(
            out,
            "{},{},{},{:.2},{:.2},{:.2},{:.2},{}",
            escape_csv(&op.id),
            op.kind,
            date,
            op.amount,
            entry.impact,
            entry.balance_before,
            entry.balance_after,
            escape_csv(op.description.as_deref().unwrap_or("")),
        )?;
    }
    Ok(())
}

fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_only_when_needed() {
        assert_eq!(escape_csv("rent"), "rent");
        assert_eq!(escape_csv("rent, march"), "\"rent, march\"");
        assert_eq!(escape_csv("the \"big\" one"), "\"the \"\"big\"\" one\"");
        assert_eq!(escape_csv("line\rbreak"), "\"line\rbreak\"");
    }

    #[test]
    fn empty_ledger_writes_header_only() {
        let mut buf = Vec::new();
        write_ledger_csv(&Ledger::empty(), &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), format!("{LEDGER_CSV_HEADER}\n"));
    }
}
