//! Read-only views over the parts of a report message the pipeline uses.

use chrono::NaiveDateTime;
use intake_core::{IntakeConfig, ProcessingError, ProcessingResult};
use tracing::debug;

use crate::message::{Message, Repetition, Segment};
use crate::timestamp::parse_dtm;

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderView {
    pub sending_application: Option<String>,
    pub sending_facility: Option<String>,
    pub message_datetime: Option<NaiveDateTime>,
    pub control_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientIdentifierView {
    pub value: String,
    pub identifier_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendingDoctor {
    pub id: Option<String>,
    pub family_name: Option<String>,
    pub given_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitView {
    pub admission_type: Option<String>,
    pub attending: Option<AttendingDoctor>,
}

/// CE / CWE components, positions 1 through 6.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodedElement {
    pub identifier: Option<String>,
    pub text: Option<String>,
    pub coding_system: Option<String>,
    pub alternate_identifier: Option<String>,
    pub alternate_text: Option<String>,
    pub alternate_coding_system: Option<String>,
}

impl CodedElement {
    pub fn from_repetition(rep: Repetition<'_>) -> Self {
        let part = |n: usize| {
            rep.component(n)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            identifier: part(1),
            text: part(2),
            coding_system: part(3),
            alternate_identifier: part(4),
            alternate_text: part(5),
            alternate_coding_system: part(6),
        }
    }
}

/// One OBX with the NTE segments that follow it.
#[derive(Debug, Clone)]
pub struct ObservationView<'a> {
    pub obx: &'a Segment,
    pub comments: Vec<&'a Segment>,
}

impl<'a> ObservationView<'a> {
    /// OBX-2, e.g. `NM`, `CWE`.
    pub fn value_type(&self) -> &'a str {
        self.obx.value(2).trim()
    }

    /// OBX-3 observation identifier.
    pub fn identifier(&self) -> CodedElement {
        self.obx
            .field(3)
            .and_then(|field| field.repetitions().next())
            .map(CodedElement::from_repetition)
            .unwrap_or_default()
    }

    /// OBX-5 repetitions; empty when the field is absent or blank.
    pub fn values(&self) -> Vec<Repetition<'a>> {
        match self.obx.field(5) {
            Some(field) if !field.is_empty() => field.repetitions().collect(),
            _ => Vec::new(),
        }
    }

    /// OBX-14 date/time of the observation.
    pub fn observed_at(&self) -> Option<NaiveDateTime> {
        parse_dtm(self.obx.value(14))
    }
}

/// First order-observation group.
#[derive(Debug, Clone)]
pub struct OrderView<'a> {
    pub obr: &'a Segment,
    pub observation_datetime: Option<NaiveDateTime>,
    pub observations: Vec<ObservationView<'a>>,
}

#[derive(Debug, Clone)]
pub struct ReportView<'a> {
    pub header: HeaderView,
    pub patient_identifiers: Vec<PatientIdentifierView>,
    pub visit: VisitView,
    pub order: OrderView<'a>,
}

/// True only for messages of the configured report type.
pub fn can_process(message: &Message, config: &IntakeConfig) -> bool {
    message.message_type().as_deref() == Some(config.report_message_type.as_str())
}

/// Check the declared type and pull out header, patient, visit and the first
/// order-observation group.
pub fn navigate<'a>(message: &'a Message, config: &IntakeConfig) -> ProcessingResult<ReportView<'a>> {
    if !can_process(message, config) {
        return Err(ProcessingError::InvalidMessageType {
            expected: config.report_message_type.clone(),
            received: message.message_type().unwrap_or_default(),
        });
    }

    let msh = message
        .segment("MSH")
        .ok_or(ProcessingError::MissingSegment("MSH"))?;
    let pid = message
        .segment("PID")
        .ok_or(ProcessingError::MissingSegment("PID"))?;
    let pv1 = message
        .segment("PV1")
        .ok_or(ProcessingError::MissingSegment("PV1"))?;

    let header = HeaderView {
        sending_application: msh.component(3, 1).map(str::to_string),
        sending_facility: msh.component(4, 1).map(|s| s.trim().to_string()),
        message_datetime: parse_dtm(msh.value(7)),
        control_id: msh.value(10).to_string(),
    };
    debug!(control_id = %header.control_id, "navigating report message");

    Ok(ReportView {
        header,
        patient_identifiers: patient_identifiers(pid),
        visit: visit(pv1),
        order: first_order_group(message)?,
    })
}

fn patient_identifiers(pid: &Segment) -> Vec<PatientIdentifierView> {
    let Some(field) = pid.field(3) else {
        return Vec::new();
    };
    field
        .repetitions()
        .filter_map(|rep| {
            let value = rep.component(1).map(str::trim).filter(|s| !s.is_empty())?;
            Some(PatientIdentifierView {
                value: value.to_string(),
                identifier_type: rep
                    .component(5)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            })
        })
        .collect()
}

fn visit(pv1: &Segment) -> VisitView {
    let attending = pv1
        .field(7)
        .and_then(|field| field.repetitions().next())
        .filter(|rep| !rep.is_empty())
        .map(|rep| {
            let text = |value: Option<&str>| {
                value
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            AttendingDoctor {
                id: text(rep.component(1)),
                family_name: text(rep.subcomponent(2, 1)),
                given_name: text(rep.component(3)),
            }
        });

    VisitView {
        admission_type: pv1.component(4, 1).map(|s| s.trim().to_string()),
        attending,
    }
}

fn first_order_group(message: &Message) -> ProcessingResult<OrderView<'_>> {
    let mut segments = message
        .segments
        .iter()
        .skip_while(|segment| segment.name != "OBR");
    let obr = segments
        .next()
        .ok_or(ProcessingError::MissingSegment("OBR"))?;

    let mut observations: Vec<ObservationView<'_>> = Vec::new();
    let mut collecting_comments = false;
    for segment in segments {
        match segment.name.as_str() {
            "OBR" => {
                debug!("ignoring order observation groups after the first");
                break;
            }
            "OBX" => {
                observations.push(ObservationView {
                    obx: segment,
                    comments: Vec::new(),
                });
                collecting_comments = true;
            }
            "NTE" if collecting_comments => {
                if let Some(current) = observations.last_mut() {
                    current.comments.push(segment);
                }
            }
            _ => collecting_comments = false,
        }
    }
    Ok(OrderView {
        obr,
        observation_datetime: parse_dtm(obr.value(7)),
        observations,
    })
}
