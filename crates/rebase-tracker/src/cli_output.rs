//! Centralised helpers for user-facing CLI output written to stderr.

use std::io::Write as _;

use crate::ledger::LedgerSummary;

fn stderr_writeln(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    if stderr.write_all(b"\n").is_err() {
        return;
    }
    let _flush = stderr.flush();
}

pub fn print_discovered(added: usize) {
    stderr_writeln(&format!("Discovered and wrote {added} rebases"));
}

pub fn print_checked(checked: &LedgerSummary) {
    stderr_writeln(&format!(
        "Checked {} rebases: {} redeemed, {} unredeemed, {} unknown",
        checked.total, checked.redeemed, checked.unredeemed, checked.unknown
    ));
}

pub fn print_config_written(path: &std::path::Path) {
    stderr_writeln(&format!("Wrote default config to {}", path.display()));
}
