//! Core model for turning inbound observation reports into clinical records.
//!
//! The crate holds the normalized record (encounters and their observations),
//! the identities they refer to, the error taxonomy, the intake configuration
//! and the collaborator traits the processing pipeline is written against.

pub mod config;
pub mod directory;
pub mod error;
pub mod memory;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use config::IntakeConfig;
pub use error::{DirectoryError, DirectoryResult, ProcessingError, ProcessingResult};

/// Datatype of a concept; governs how raw observation values decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConceptDatatype {
    Boolean,
    Numeric,
    Coded,
    Text,
    Date,
    Datetime,
    Time,
    Other(String),
}

impl ConceptDatatype {
    pub fn label(&self) -> &str {
        match self {
            Self::Boolean => "boolean",
            Self::Numeric => "numeric",
            Self::Coded => "coded",
            Self::Text => "text",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Time => "time",
            Self::Other(name) => name,
        }
    }
}

/// A coded clinical term held in the concept directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Concept {
    pub id: i64,
    pub name: String,
    pub datatype: ConceptDatatype,
    /// Ids of the concepts registered as valid answers (coded concepts only).
    #[serde(default)]
    pub answers: Vec<i64>,
}

impl Concept {
    pub fn accepts_answer(&self, answer: &Concept) -> bool {
        self.answers.contains(&answer.id)
    }
}

/// Reference to a specific name of a coded answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptNameRef {
    pub id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientIdentifier {
    pub identifier_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Patient {
    pub id: i64,
    pub given_name: String,
    pub family_name: String,
    #[serde(default)]
    pub identifiers: Vec<PatientIdentifier>,
}

impl Patient {
    pub fn has_identifier(&self, identifier_type: &str, value: &str) -> bool {
        self.identifiers
            .iter()
            .any(|id| id.identifier_type == identifier_type && id.value == value)
    }
}

/// Definition of a person attribute (e.g. `EPID`, `Role`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeType {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonAttribute {
    pub attribute_type: String,
    pub value: String,
}

/// A person in the directory; providers are persons carrying an EPID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Person {
    pub id: i64,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub gender: String,
    #[serde(default)]
    pub attributes: Vec<PersonAttribute>,
}

impl Person {
    pub fn attribute(&self, attribute_type: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.attribute_type == attribute_type)
            .map(|attr| attr.value.as_str())
    }
}

/// A person not yet persisted; the directory assigns its id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewPerson {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub gender: String,
    pub attributes: Vec<PersonAttribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub id: i64,
    pub name: String,
    /// Free text; may carry an external facility id after a colon.
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncounterType {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// Decoded value of an observation; exactly one variant per observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObsValue {
    Boolean {
        value: bool,
    },
    Numeric {
        value: f64,
    },
    Coded {
        concept_id: i64,
        name: Option<ConceptNameRef>,
    },
    Drug {
        concept_id: i64,
        drug_id: i64,
    },
    Datetime {
        value: NaiveDateTime,
    },
    Text {
        value: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    /// Assigned when the owning encounter is saved.
    pub id: Option<i64>,
    pub uuid: Uuid,
    pub concept_id: i64,
    pub person_id: i64,
    pub encounter_uuid: Uuid,
    pub datetime: NaiveDateTime,
    pub location_id: Option<i64>,
    pub creator: String,
    pub created_at: NaiveDateTime,
    pub comment: Option<String>,
    pub value: ObsValue,
}

/// One encounter per processed report, owning its observations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Encounter {
    /// Assigned by the encounter store on save.
    pub id: Option<i64>,
    pub uuid: Uuid,
    pub patient_id: i64,
    pub encounter_type_id: i64,
    pub provider_id: Option<i64>,
    pub location_id: Option<i64>,
    pub datetime: NaiveDateTime,
    pub creator: String,
    pub created_at: NaiveDateTime,
    pub observations: Vec<Observation>,
}

impl Encounter {
    /// Start an unsaved encounter for a patient.
    pub fn new(
        patient_id: i64,
        encounter_type_id: i64,
        datetime: NaiveDateTime,
        context: &ProcessingContext,
    ) -> Self {
        Self {
            id: None,
            uuid: Uuid::new_v4(),
            patient_id,
            encounter_type_id,
            provider_id: None,
            location_id: None,
            datetime,
            creator: context.creator.clone(),
            created_at: context.now,
            observations: Vec::new(),
        }
    }

    pub fn add_observation(&mut self, observation: Observation) {
        self.observations.push(observation);
    }
}

/// Per-call values that would otherwise come from ambient state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingContext {
    /// User recorded as creator of encounters and observations.
    pub creator: String,
    pub now: NaiveDateTime,
}

impl ProcessingContext {
    pub fn new(creator: impl Into<String>, now: NaiveDateTime) -> Self {
        Self {
            creator: creator.into(),
            now,
        }
    }

    /// Context stamped with the local wall clock.
    pub fn now(creator: impl Into<String>) -> Self {
        Self::new(creator, chrono::Local::now().naive_local())
    }
}
