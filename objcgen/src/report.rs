//! Per-module coverage report: ported and skipped declarations plus a
//! histogram over default-argument counts.

use std::collections::BTreeMap;

use itertools::Itertools;

/// Render the module report. Skipped entries already carry their reason and
/// trailing newlines.
pub fn make_report(
    ported: &[String],
    skipped: &[String],
    def_args_hist: &BTreeMap<usize, usize>,
) -> String {
    let total = ported.len() + skipped.len();
    let mut report = String::new();
    report.push_str(&format!(
        "PORTED FUNCs LIST ({} of {}):\n\n",
        ported.len(),
        total
    ));
    report.push_str(&ported.iter().join("\n"));
    report.push_str(&format!(
        "\n\nSKIPPED FUNCs LIST ({} of {}):\n\n",
        skipped.len(),
        total
    ));
    report.push_str(&skipped.concat());
    for (def_args, funcs) in def_args_hist {
        report.push_str(&format!("\n{def_args} def args - {funcs} funcs"));
    }
    report
}
