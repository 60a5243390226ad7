//! Type-directed decoding of OBX segments into observations.

use intake_core::directory::ConceptDirectory;
use intake_core::{
    Concept, ConceptDatatype, ConceptNameRef, Encounter, IntakeConfig, ObsValue, Observation,
    ProcessingContext, ProcessingError, ProcessingResult,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::comments::aggregate_comments;
use crate::message::Repetition;
use crate::navigator::{CodedElement, ObservationView};
use crate::timestamp::{parse_date, parse_dtm, parse_time};

/// OBX-2 value types the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// `NM`
    Numeric,
    /// `CWE`
    CodedWithExceptions,
    /// `CE`
    Coded,
    /// `DT`
    Date,
    /// `TS`
    Timestamp,
    /// `TM`
    Time,
    /// `ST`
    Text,
}

impl ValueType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "NM" => Some(Self::Numeric),
            "CWE" => Some(Self::CodedWithExceptions),
            "CE" => Some(Self::Coded),
            "DT" => Some(Self::Date),
            "TS" => Some(Self::Timestamp),
            "TM" => Some(Self::Time),
            "ST" => Some(Self::Text),
            _ => None,
        }
    }
}

pub struct ObservationDecoder<'a> {
    concepts: &'a dyn ConceptDirectory,
    config: &'a IntakeConfig,
    context: &'a ProcessingContext,
}

impl<'a> ObservationDecoder<'a> {
    pub fn new(
        concepts: &'a dyn ConceptDirectory,
        config: &'a IntakeConfig,
        context: &'a ProcessingContext,
    ) -> Self {
        Self {
            concepts,
            config,
            context,
        }
    }

    /// Decode one observation for `encounter`.
    ///
    /// `Ok(None)` means the observation carries no usable value and is
    /// dropped; every other problem is an error that aborts the message.
    pub fn decode(
        &self,
        view: &ObservationView<'_>,
        encounter: &Encounter,
        message_id: &str,
    ) -> ProcessingResult<Option<Observation>> {
        let values = view.values();
        let Some(first) = values.first().copied() else {
            debug!(message_id, "observation has no value, skipping");
            return Ok(None);
        };

        let tag = view.value_type();
        let value_type = ValueType::from_tag(tag)
            .ok_or_else(|| ProcessingError::UnsupportedDatatype(tag.to_string()))?;
        debug!(datatype = tag, "decoding observation");

        let concept = self.observation_concept(&view.identifier())?;
        debug!(concept_id = concept.id, "observation concept");

        let value = match value_type {
            ValueType::Numeric => self.decode_numeric(first, &concept, message_id)?,
            ValueType::CodedWithExceptions => Some(self.decode_cwe(first, &concept)?),
            ValueType::Coded => Some(self.decode_ce(first, &concept)?),
            ValueType::Date => first.component(1).and_then(parse_date).map(datetime_value),
            ValueType::Timestamp => first.component(1).and_then(parse_dtm).map(datetime_value),
            ValueType::Time => first.component(1).and_then(parse_time).map(datetime_value),
            ValueType::Text => first
                .component(1)
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(|text| ObsValue::Text {
                    value: text.to_string(),
                }),
        };

        let Some(value) = value else {
            warn!(
                concept_id = concept.id,
                concept = %concept.name,
                "not creating null valued observation"
            );
            return Ok(None);
        };

        Ok(Some(Observation {
            id: None,
            uuid: Uuid::new_v4(),
            concept_id: concept.id,
            person_id: encounter.patient_id,
            encounter_uuid: encounter.uuid,
            datetime: view.observed_at().unwrap_or(encounter.datetime),
            location_id: encounter.location_id,
            creator: encounter.creator.clone(),
            created_at: self.context.now,
            comment: aggregate_comments(&view.comments),
            value,
        }))
    }

    /// Concept named by OBX-3, looked up by code and coding system.
    fn observation_concept(&self, identifier: &CodedElement) -> ProcessingResult<Concept> {
        let code = identifier.identifier.clone().unwrap_or_default();
        let coding_system = identifier.coding_system.clone().unwrap_or_default();
        match self.concepts.find_by_mapping(&code, &coding_system)? {
            Some(concept) => Ok(concept),
            None => Err(ProcessingError::ConceptNotFound {
                code,
                coding_system,
            }),
        }
    }

    fn decode_numeric(
        &self,
        value: Repetition<'_>,
        concept: &Concept,
        message_id: &str,
    ) -> ProcessingResult<Option<ObsValue>> {
        let raw = value.component(1).unwrap_or("").trim();
        if raw.is_empty() {
            return Ok(None);
        }

        if raw == "0" || raw == "1" {
            return self.decode_flag(raw == "1", concept).map(Some);
        }

        match raw.parse::<f64>() {
            Ok(number) if number.is_finite() => Ok(Some(ObsValue::Numeric { value: number })),
            _ => Err(ProcessingError::InvalidNumericValue {
                value: raw.to_string(),
                concept_id: concept.id,
                message_id: message_id.to_string(),
            }),
        }
    }

    /// A literal `0`/`1` interpreted against the concept's datatype.
    fn decode_flag(&self, flag: bool, concept: &Concept) -> ProcessingResult<ObsValue> {
        match &concept.datatype {
            ConceptDatatype::Boolean => Ok(ObsValue::Boolean { value: flag }),
            ConceptDatatype::Numeric => Ok(ObsValue::Numeric {
                value: if flag { 1.0 } else { 0.0 },
            }),
            ConceptDatatype::Coded => {
                let answer = if flag {
                    self.concepts.true_concept()?
                } else {
                    self.concepts.false_concept()?
                };
                if !concept.accepts_answer(&answer) {
                    return Err(ProcessingError::InvalidAnswer {
                        concept_id: concept.id,
                        answer_id: answer.id,
                    });
                }
                Ok(ObsValue::Coded {
                    concept_id: answer.id,
                    name: None,
                })
            }
            other => Err(ProcessingError::UnsupportedBooleanTarget {
                concept_id: concept.id,
                datatype: other.label().to_string(),
            }),
        }
    }

    fn decode_cwe(&self, value: Repetition<'_>, concept: &Concept) -> ProcessingResult<ObsValue> {
        let coded = CodedElement::from_repetition(value);
        self.reject_proposal(&coded, concept)?;

        let display = coded
            .text
            .clone()
            .or_else(|| coded.identifier.clone())
            .unwrap_or_default();
        let value_concept = self.concepts.find_by_name(&display)?.ok_or_else(|| {
            ProcessingError::ConceptNotFound {
                code: display.clone(),
                coding_system: coded.coding_system.clone().unwrap_or_default(),
            }
        })?;

        if coded.alternate_coding_system.as_deref() == Some(self.config.local_drug_system.as_str()) {
            let alternate = coded.alternate_identifier.clone().unwrap_or_default();
            let drug_id = alternate
                .parse::<i64>()
                .map_err(|_| ProcessingError::InvalidConceptId {
                    identifier: alternate.clone(),
                    name: display.clone(),
                })?;
            return Ok(ObsValue::Drug {
                concept_id: value_concept.id,
                drug_id,
            });
        }

        Ok(ObsValue::Coded {
            concept_id: value_concept.id,
            name: alternate_concept_name(&coded),
        })
    }

    fn decode_ce(&self, value: Repetition<'_>, concept: &Concept) -> ProcessingResult<ObsValue> {
        let coded = CodedElement::from_repetition(value);
        self.reject_proposal(&coded, concept)?;

        let identifier = coded.identifier.clone().unwrap_or_default();
        let invalid_id = || ProcessingError::InvalidConceptId {
            identifier: identifier.clone(),
            name: coded.text.clone().unwrap_or_default(),
        };
        identifier.parse::<i64>().map_err(|_| invalid_id())?;

        let coding_system = coded.coding_system.clone().unwrap_or_default();
        let value_concept = self
            .concepts
            .find_by_mapping(&identifier, &coding_system)?
            .ok_or_else(|| ProcessingError::ConceptNotFound {
                code: identifier.clone(),
                coding_system,
            })?;

        Ok(ObsValue::Coded {
            concept_id: value_concept.id,
            name: Some(ConceptNameRef {
                id: None,
                name: Some(value_concept.name),
            }),
        })
    }

    fn reject_proposal(&self, coded: &CodedElement, concept: &Concept) -> ProcessingResult<()> {
        if coded.identifier.as_deref() == Some(self.config.proposal_identifier.as_str()) {
            debug!(concept_id = concept.id, "proposing concept");
            return Err(ProcessingError::ConceptProposal {
                concept: concept.clone(),
                proposed_name: coded.text.clone().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

fn datetime_value(value: chrono::NaiveDateTime) -> ObsValue {
    ObsValue::Datetime { value }
}

/// Concept name referenced by the alternate identifier, when it is numeric.
fn alternate_concept_name(coded: &CodedElement) -> Option<ConceptNameRef> {
    let alternate = coded.alternate_identifier.as_deref()?;
    match alternate.parse::<i64>() {
        Ok(id) => Some(ConceptNameRef {
            id: Some(id),
            name: coded.alternate_text.clone(),
        }),
        Err(_) => {
            debug!(alternate, "invalid concept name id");
            None
        }
    }
}
