//! Contracts of the directories and stores the pipeline reads and writes.
//!
//! Every collaborator is injected explicitly; implementations decide how and
//! where the data lives. Lookups return owned values so callers never hold a
//! borrow into the backing store.

use serde::{Deserialize, Serialize};

use crate::{
    AttributeType, Concept, DirectoryResult, Encounter, EncounterType, Location, NewPerson,
    Patient, Person,
};

pub trait PatientDirectory {
    /// All patients carrying `identifier` under `identifier_type`.
    fn find_by_identifier(
        &self,
        identifier_type: &str,
        identifier: &str,
    ) -> DirectoryResult<Vec<Patient>>;
}

pub trait PersonDirectory {
    /// Person whose `attribute_type` attribute equals `value`.
    fn find_by_attribute(
        &self,
        attribute_type: &str,
        value: &str,
    ) -> DirectoryResult<Option<Person>>;

    fn create_person(&self, person: NewPerson) -> DirectoryResult<Person>;

    /// Get-or-create; calling twice with the same name yields the same type.
    fn ensure_attribute_type(&self, name: &str, description: &str)
        -> DirectoryResult<AttributeType>;
}

pub trait LocationDirectory {
    fn list_all(&self) -> DirectoryResult<Vec<Location>>;
}

pub trait EncounterTypeDirectory {
    fn find_by_name(&self, name: &str) -> DirectoryResult<Option<EncounterType>>;

    fn create(&self, name: &str, description: &str) -> DirectoryResult<EncounterType>;
}

pub trait ConceptDirectory {
    fn find_by_mapping(&self, code: &str, coding_system: &str) -> DirectoryResult<Option<Concept>>;

    fn find_by_name(&self, name: &str) -> DirectoryResult<Option<Concept>>;

    fn true_concept(&self) -> DirectoryResult<Concept>;

    fn false_concept(&self) -> DirectoryResult<Concept>;
}

pub trait EncounterStore {
    /// Persist the encounter with its observations, returning it with ids set.
    fn save(&self, encounter: Encounter) -> DirectoryResult<Encounter>;
}

/// A stored inbound message awaiting replay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub id: i64,
    /// Raw encoded message; absent when the log row carries no payload.
    pub payload: Option<String>,
}

pub trait MessageLog {
    /// Entries with `from_id <= id <= to_id`, in id order.
    fn entries(&self, from_id: i64, to_id: i64) -> DirectoryResult<Vec<LogEntry>>;
}

/// Borrowed bundle of every collaborator the processor needs.
#[derive(Clone, Copy)]
pub struct Directories<'a> {
    pub patients: &'a dyn PatientDirectory,
    pub persons: &'a dyn PersonDirectory,
    pub locations: &'a dyn LocationDirectory,
    pub encounter_types: &'a dyn EncounterTypeDirectory,
    pub concepts: &'a dyn ConceptDirectory,
    pub encounters: &'a dyn EncounterStore,
}

impl<'a, T> From<&'a T> for Directories<'a>
where
    T: PatientDirectory
        + PersonDirectory
        + LocationDirectory
        + EncounterTypeDirectory
        + ConceptDirectory
        + EncounterStore,
{
    fn from(all: &'a T) -> Self {
        Self {
            patients: all,
            persons: all,
            locations: all,
            encounter_types: all,
            concepts: all,
            encounters: all,
        }
    }
}
