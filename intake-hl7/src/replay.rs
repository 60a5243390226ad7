//! Replays stored message logs through the report processor.
//!
//! Only reports from the configured sending application whose admission type
//! is in the replay set are processed. A failing entry is logged and recorded;
//! the replay always moves on to the next entry.

use intake_core::directory::MessageLog;
use intake_core::{ProcessingContext, ProcessingResult};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::assembler::ReportProcessor;
use crate::message::{Message, MessageParser};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayFailure {
    pub entry_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub processed: usize,
    pub skipped: usize,
    pub failures: Vec<ReplayFailure>,
}

/// Why an entry was not forwarded to the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    NoPayload,
    ForeignApplication,
    AdmissionType,
}

pub fn replay(
    log: &dyn MessageLog,
    from_id: i64,
    to_id: i64,
    parser: &dyn MessageParser,
    processor: &ReportProcessor<'_>,
    context: &ProcessingContext,
) -> ProcessingResult<ReplaySummary> {
    let entries = log.entries(from_id, to_id)?;
    info!(from_id, to_id, entries = entries.len(), "beginning replay");

    let mut summary = ReplaySummary::default();
    for entry in entries {
        let Some(payload) = entry.payload.as_deref() else {
            record_skip(&mut summary, entry.id, Skip::NoPayload);
            continue;
        };

        let message = match parser.parse(payload) {
            Ok(message) => message,
            Err(err) => {
                record_failure(&mut summary, entry.id, err.to_string());
                continue;
            }
        };

        if let Some(reason) = skip_reason(&message, processor) {
            record_skip(&mut summary, entry.id, reason);
            continue;
        }

        match processor.process_report_message(message, context) {
            Ok(_) => {
                info!(entry_id = entry.id, "replayed entry");
                summary.processed += 1;
            }
            Err(err) => record_failure(&mut summary, entry.id, err.to_string()),
        }
    }

    info!(
        processed = summary.processed,
        skipped = summary.skipped,
        failed = summary.failures.len(),
        "replay finished"
    );
    Ok(summary)
}

fn skip_reason(message: &Message, processor: &ReportProcessor<'_>) -> Option<Skip> {
    let config = processor.config();
    let msh = message.segment("MSH")?;
    if msh.component(3, 1) != Some(config.sending_application.as_str()) {
        return Some(Skip::ForeignApplication);
    }

    let admission_type = message
        .segment("PV1")
        .and_then(|pv1| pv1.component(4, 1))
        .unwrap_or("");
    if !config.replays_admission_type(admission_type) {
        return Some(Skip::AdmissionType);
    }
    None
}

fn record_skip(summary: &mut ReplaySummary, entry_id: i64, reason: Skip) {
    warn!(entry_id, reason = ?reason, "skipping log entry");
    summary.skipped += 1;
}

fn record_failure(summary: &mut ReplaySummary, entry_id: i64, error: String) {
    error!(entry_id, error = %error, "log entry failed");
    summary.failures.push(ReplayFailure { entry_id, error });
}
