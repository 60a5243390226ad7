use crate::Concept;

/// Failure reported by a directory or store collaborator.
#[derive(Debug, thiserror::Error)]
#[error("directory operation `{operation}` failed: {reason}")]
pub struct DirectoryError {
    pub operation: &'static str,
    pub reason: String,
}

impl DirectoryError {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Reasons a report message cannot be turned into an encounter.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("invalid message type: expected {expected}, received {received}")]
    InvalidMessageType { expected: String, received: String },
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("message has no {0} segment")]
    MissingSegment(&'static str),
    #[error("order observation group carries no usable observation datetime")]
    MissingEncounterDatetime,
    #[error("could not resolve patient {identifier_type} `{identifier}`: {matches} matches")]
    PatientNotResolved {
        identifier_type: String,
        identifier: String,
        matches: usize,
    },
    #[error("no concept mapped to `{code}` in coding system `{coding_system}`")]
    ConceptNotFound { code: String, coding_system: String },
    #[error("unsupported observation datatype `{0}`")]
    UnsupportedDatatype(String),
    #[error("invalid concept id `{identifier}` for value `{name}`")]
    InvalidConceptId { identifier: String, name: String },
    #[error("concept #{answer_id} is not a valid answer for concept #{concept_id}")]
    InvalidAnswer { concept_id: i64, answer_id: i64 },
    #[error("can't set boolean answer for concept #{concept_id} of datatype {datatype}")]
    UnsupportedBooleanTarget { concept_id: i64, datatype: String },
    #[error("numeric value `{value}` is not numeric for concept #{concept_id} in message {message_id}")]
    InvalidNumericValue {
        value: String,
        concept_id: i64,
        message_id: String,
    },
    #[error("proposed concept `{proposed_name}` for concept #{}", concept.id)]
    ConceptProposal {
        concept: Concept,
        proposed_name: String,
    },
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl ProcessingError {
    /// Proposals signal a concept workflow rather than a broken message.
    pub fn is_concept_proposal(&self) -> bool {
        matches!(self, Self::ConceptProposal { .. })
    }
}

pub type ProcessingResult<T> = std::result::Result<T, ProcessingError>;
