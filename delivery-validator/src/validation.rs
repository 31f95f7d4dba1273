use std::num::NonZeroU64;

use tracing::{info, warn};

use crate::error::SinkError;
use crate::identity::extract_identity;
use crate::ledger::DeduplicationLedger;
use crate::report::ValidationReport;
use crate::source::SinkReader;

/// Counters for one pass over a sink.
#[derive(Debug, Default)]
pub struct RunTally {
    pub ledger: DeduplicationLedger,
    /// Payloads whose identity was extracted, duplicates included
    pub parsed: u64,
    pub malformed: u64,
}

/// Reads the sink to exhaustion, folding every payload into a fresh ledger.
/// Malformed payloads are logged and skipped. A sink error aborts the pass and
/// nothing of it is kept.
pub async fn scan_sink(
    reader: &mut dyn SinkReader,
    expected_records: u64,
) -> Result<RunTally, SinkError> {
    let mut tally = RunTally {
        ledger: DeduplicationLedger::with_expected(expected_records),
        ..RunTally::default()
    };

    while let Some(payload) = reader.next_payload().await? {
        match payload.log.and_then(|log| extract_identity(&log)) {
            Ok(identity) => {
                tally.parsed += 1;
                tally.ledger.insert(identity);
            }
            Err(e) => {
                tally.malformed += 1;
                warn!(
                    "[TEST ERROR] Malformed log entry in {}: {}",
                    payload.location, e
                );
            }
        }
    }

    Ok(tally)
}

/// One full validation: scan, then compute the report.
pub async fn validate(
    reader: &mut dyn SinkReader,
    input_records: NonZeroU64,
    log_delay: &str,
) -> Result<ValidationReport, SinkError> {
    let tally = scan_sink(reader, input_records.get()).await?;
    let summary = reader.summary();

    info!(
        "Scan finished: {} pages, {:?} objects, {} parsed, {} unique, {} malformed",
        summary.pages,
        summary.objects,
        tally.parsed,
        tally.ledger.len(),
        tally.malformed
    );

    let unique = u64::try_from(tally.ledger.len()).unwrap_or(u64::MAX);
    Ok(
        ValidationReport::compute(input_records, tally.parsed, unique, log_delay)
            .with_objects_scanned(summary.objects),
    )
}
