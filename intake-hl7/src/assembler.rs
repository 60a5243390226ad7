//! Builds and persists one encounter per report message.

use intake_core::directory::Directories;
use intake_core::{
    Encounter, IntakeConfig, ProcessingContext, ProcessingError, ProcessingResult,
};
use tracing::{debug, info, warn};

use crate::decoder::ObservationDecoder;
use crate::message::Message;
use crate::navigator::{self, ReportView};
use crate::resolver::IdentityResolver;

/// Progress of a single message through the processor; traced at debug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Stage {
    Received,
    TypeValidated,
    SegmentsExtracted,
    PatientResolved,
    ObservationsAttached,
    EncounterPersisted,
    Completed,
    Failed(String),
}

#[derive(Debug)]
struct StageTracker {
    stage: Stage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: Stage::Received,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!(from = ?self.stage, to = ?next, "report stage");
        self.stage = next;
    }
}

/// Outcome of a processed report.
#[derive(Debug, Clone)]
pub struct ProcessedReport {
    /// The inbound message with OBR-3.1 set to the encounter id.
    pub acknowledgment: Message,
    pub encounter: Encounter,
}

pub struct ReportProcessor<'a> {
    directories: Directories<'a>,
    config: &'a IntakeConfig,
}

impl<'a> ReportProcessor<'a> {
    pub fn new(directories: Directories<'a>, config: &'a IntakeConfig) -> Self {
        Self {
            directories,
            config,
        }
    }

    pub fn config(&self) -> &IntakeConfig {
        self.config
    }

    pub fn can_process(&self, message: &Message) -> bool {
        navigator::can_process(message, self.config)
    }

    /// Process a report and echo the message back as acknowledgment.
    pub fn process_report_message(
        &self,
        message: Message,
        context: &ProcessingContext,
    ) -> ProcessingResult<Message> {
        self.process(message, context)
            .map(|report| report.acknowledgment)
    }

    /// Process a report, returning the persisted encounter alongside the echo.
    ///
    /// Observations are decoded and attached in memory first; the encounter
    /// is saved once with all of them. A failure anywhere leaves nothing
    /// persisted apart from auto-provisioned providers and encounter types.
    pub fn process(
        &self,
        mut message: Message,
        context: &ProcessingContext,
    ) -> ProcessingResult<ProcessedReport> {
        let mut tracker = StageTracker::new();
        let encounter = match self.assemble(&message, context, &mut tracker) {
            Ok(encounter) => encounter,
            Err(err) => {
                warn!(stage = ?tracker.stage, error = %err, "report processing failed");
                tracker.advance(Stage::Failed(err.to_string()));
                return Err(err);
            }
        };

        if let (Some(id), Some(obr)) = (encounter.id, message.segment_mut("OBR")) {
            obr.set_component(3, 1, &id.to_string());
        }
        tracker.advance(Stage::Completed);
        info!(
            encounter_id = ?encounter.id,
            observations = encounter.observations.len(),
            "finished processing report"
        );

        Ok(ProcessedReport {
            acknowledgment: message,
            encounter,
        })
    }

    fn assemble(
        &self,
        message: &Message,
        context: &ProcessingContext,
        tracker: &mut StageTracker,
    ) -> ProcessingResult<Encounter> {
        let report = navigator::navigate(message, self.config)?;
        tracker.advance(Stage::TypeValidated);
        tracker.advance(Stage::SegmentsExtracted);

        let resolver = IdentityResolver::new(self.directories, self.config);
        let patient = resolver.resolve_patient(&report.patient_identifiers)?;
        tracker.advance(Stage::PatientResolved);

        let provider = resolver.resolve_provider(&report.visit)?;
        let location = resolver.resolve_location(&report.header)?;
        let encounter_type = resolver.resolve_encounter_type(&report.visit)?;

        let datetime = encounter_datetime(&report)?;
        let mut encounter = Encounter::new(patient.id, encounter_type.id, datetime, context);
        encounter.provider_id = provider.map(|person| person.id);
        encounter.location_id = location.map(|location| location.id);

        let decoder = ObservationDecoder::new(self.directories.concepts, self.config, context);
        let message_id = report.header.control_id.as_str();
        for view in &report.order.observations {
            if let Some(observation) = decoder.decode(view, &encounter, message_id)? {
                encounter.add_observation(observation);
            }
        }
        tracker.advance(Stage::ObservationsAttached);

        let persisted = self.directories.encounters.save(encounter)?;
        tracker.advance(Stage::EncounterPersisted);
        Ok(persisted)
    }
}

/// OBR-7, falling back to MSH-7.
fn encounter_datetime(report: &ReportView<'_>) -> ProcessingResult<chrono::NaiveDateTime> {
    report
        .order
        .observation_datetime
        .or(report.header.message_datetime)
        .ok_or(ProcessingError::MissingEncounterDatetime)
}
