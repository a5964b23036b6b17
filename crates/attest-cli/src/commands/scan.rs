//! Scan command implementation.

use crate::cli::ScanArgs;
use crate::error::Result;
use crate::output::Formatter;
use attest_gatekeeper::scan;

/// Execute the scan command.
pub fn execute_scan(args: ScanArgs, formatter: &Formatter) -> Result<()> {
    let candidates = scan(&args.text);
    tracing::debug!("Found {} numeric claims", candidates.len());
    println!("{}", formatter.format_candidates(&args.text, &candidates)?);
    Ok(())
}
