//! Human-readable run summary

use super::RunResult;

/// Totals plus one block per failed entry
pub fn summarize(results: &[RunResult]) -> String {
    if results.is_empty() {
        return "No entries executed.\n".to_string();
    }

    let failed: Vec<&RunResult> = results.iter().filter(|r| !r.is_success()).collect();
    let mut out = String::from("=== Matrix Run Summary ===\n");
    out.push_str(&format!("Total:   {}\n", results.len()));
    out.push_str(&format!("Success: {}\n", results.len() - failed.len()));
    out.push_str(&format!("Failed:  {}\n", failed.len()));

    if !failed.is_empty() {
        out.push_str("\nFailures:\n");
        for r in failed {
            let e = &r.entry;
            out.push_str(&format!(
                "  - {}/{} ({}, flow={})\n",
                e.version,
                e.scenario,
                e.short_id(),
                e.flow
            ));
            if let Some(err) = &r.error {
                out.push_str(&format!("    {}\n", err));
            }
        }
    }
    out
}
