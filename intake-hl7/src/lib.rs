//! HL7v2 ORU_R01 report intake: message navigation, identity resolution,
//! observation decoding and encounter assembly.

pub mod assembler;
pub mod comments;
pub mod decoder;
pub mod message;
pub mod navigator;
pub mod replay;
pub mod resolver;
pub mod timestamp;

use intake_core::directory::Directories;
use intake_core::{IntakeConfig, ProcessingContext, ProcessingResult};

pub use assembler::{ProcessedReport, ReportProcessor};
pub use message::{Hl7Parser, Message, MessageParser};
pub use replay::{replay, ReplaySummary};

/// Parse raw pipe-delimited text and process it as a report.
pub fn process_report_str(
    raw: &str,
    directories: Directories<'_>,
    config: &IntakeConfig,
    context: &ProcessingContext,
) -> ProcessingResult<ProcessedReport> {
    let message = Hl7Parser.parse(raw)?;
    ReportProcessor::new(directories, config).process(message, context)
}
