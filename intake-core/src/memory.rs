//! In-memory directory backing every collaborator contract.
//!
//! Used by tests and the command line front end. State lives behind a
//! `RefCell`; processing is single-threaded so borrows never overlap.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::directory::{
    ConceptDirectory, EncounterStore, EncounterTypeDirectory, LocationDirectory, LogEntry,
    MessageLog, PatientDirectory, PersonDirectory,
};
use crate::{
    AttributeType, Concept, DirectoryError, DirectoryResult, Encounter, EncounterType, Location,
    NewPerson, Patient, Person,
};

/// Maps an external code in a coding system to a concept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConceptMapping {
    pub code: String,
    pub coding_system: String,
    pub concept_id: i64,
}

/// Initial directory contents, typically read from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DirectorySeed {
    pub patients: Vec<Patient>,
    pub persons: Vec<Person>,
    pub attribute_types: Vec<AttributeType>,
    pub locations: Vec<Location>,
    pub encounter_types: Vec<EncounterType>,
    pub concepts: Vec<Concept>,
    pub concept_mappings: Vec<ConceptMapping>,
    pub true_concept_id: Option<i64>,
    pub false_concept_id: Option<i64>,
    pub message_log: Vec<LogEntry>,
}

#[derive(Debug, Default)]
struct State {
    seed: DirectorySeed,
    encounters: Vec<Encounter>,
    next_id: i64,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: RefCell<State>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: DirectorySeed) -> Self {
        let highest = highest_seeded_id(&seed);
        Self {
            state: RefCell::new(State {
                seed,
                encounters: Vec::new(),
                next_id: highest,
            }),
        }
    }

    /// Encounters saved so far, in save order.
    pub fn encounters(&self) -> Vec<Encounter> {
        self.state.borrow().encounters.clone()
    }

    pub fn persons(&self) -> Vec<Person> {
        self.state.borrow().seed.persons.clone()
    }

    pub fn attribute_types(&self) -> Vec<AttributeType> {
        self.state.borrow().seed.attribute_types.clone()
    }

    pub fn encounter_types(&self) -> Vec<EncounterType> {
        self.state.borrow().seed.encounter_types.clone()
    }

    fn concept_by_id(&self, id: i64) -> Option<Concept> {
        self.state
            .borrow()
            .seed
            .concepts
            .iter()
            .find(|concept| concept.id == id)
            .cloned()
    }

    fn required_concept(&self, id: Option<i64>, operation: &'static str) -> DirectoryResult<Concept> {
        let id = id.ok_or_else(|| DirectoryError::new(operation, "no concept configured"))?;
        self.concept_by_id(id)
            .ok_or_else(|| DirectoryError::new(operation, format!("concept #{id} is not registered")))
    }
}

fn highest_seeded_id(seed: &DirectorySeed) -> i64 {
    let ids = seed
        .patients
        .iter()
        .map(|p| p.id)
        .chain(seed.persons.iter().map(|p| p.id))
        .chain(seed.attribute_types.iter().map(|t| t.id))
        .chain(seed.locations.iter().map(|l| l.id))
        .chain(seed.encounter_types.iter().map(|t| t.id))
        .chain(seed.concepts.iter().map(|c| c.id));
    ids.max().unwrap_or(0)
}

impl PatientDirectory for InMemoryDirectory {
    fn find_by_identifier(
        &self,
        identifier_type: &str,
        identifier: &str,
    ) -> DirectoryResult<Vec<Patient>> {
        Ok(self
            .state
            .borrow()
            .seed
            .patients
            .iter()
            .filter(|patient| patient.has_identifier(identifier_type, identifier))
            .cloned()
            .collect())
    }
}

impl PersonDirectory for InMemoryDirectory {
    fn find_by_attribute(
        &self,
        attribute_type: &str,
        value: &str,
    ) -> DirectoryResult<Option<Person>> {
        Ok(self
            .state
            .borrow()
            .seed
            .persons
            .iter()
            .find(|person| person.attribute(attribute_type) == Some(value))
            .cloned())
    }

    fn create_person(&self, person: NewPerson) -> DirectoryResult<Person> {
        let mut state = self.state.borrow_mut();
        let created = Person {
            id: state.allocate_id(),
            given_name: person.given_name,
            family_name: person.family_name,
            gender: person.gender,
            attributes: person.attributes,
        };
        state.seed.persons.push(created.clone());
        Ok(created)
    }

    fn ensure_attribute_type(
        &self,
        name: &str,
        description: &str,
    ) -> DirectoryResult<AttributeType> {
        let mut state = self.state.borrow_mut();
        if let Some(existing) = state.seed.attribute_types.iter().find(|t| t.name == name) {
            return Ok(existing.clone());
        }
        let created = AttributeType {
            id: state.allocate_id(),
            name: name.to_string(),
            description: description.to_string(),
        };
        state.seed.attribute_types.push(created.clone());
        Ok(created)
    }
}

impl LocationDirectory for InMemoryDirectory {
    fn list_all(&self) -> DirectoryResult<Vec<Location>> {
        Ok(self.state.borrow().seed.locations.clone())
    }
}

impl EncounterTypeDirectory for InMemoryDirectory {
    fn find_by_name(&self, name: &str) -> DirectoryResult<Option<EncounterType>> {
        Ok(self
            .state
            .borrow()
            .seed
            .encounter_types
            .iter()
            .find(|t| t.name == name)
            .cloned())
    }

    fn create(&self, name: &str, description: &str) -> DirectoryResult<EncounterType> {
        let mut state = self.state.borrow_mut();
        let created = EncounterType {
            id: state.allocate_id(),
            name: name.to_string(),
            description: description.to_string(),
        };
        state.seed.encounter_types.push(created.clone());
        Ok(created)
    }
}

impl ConceptDirectory for InMemoryDirectory {
    fn find_by_mapping(&self, code: &str, coding_system: &str) -> DirectoryResult<Option<Concept>> {
        let concept_id = self
            .state
            .borrow()
            .seed
            .concept_mappings
            .iter()
            .find(|m| m.code == code && m.coding_system == coding_system)
            .map(|m| m.concept_id);
        Ok(concept_id.and_then(|id| self.concept_by_id(id)))
    }

    fn find_by_name(&self, name: &str) -> DirectoryResult<Option<Concept>> {
        Ok(self
            .state
            .borrow()
            .seed
            .concepts
            .iter()
            .find(|concept| concept.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    fn true_concept(&self) -> DirectoryResult<Concept> {
        let id = self.state.borrow().seed.true_concept_id;
        self.required_concept(id, "true_concept")
    }

    fn false_concept(&self) -> DirectoryResult<Concept> {
        let id = self.state.borrow().seed.false_concept_id;
        self.required_concept(id, "false_concept")
    }
}

impl EncounterStore for InMemoryDirectory {
    fn save(&self, mut encounter: Encounter) -> DirectoryResult<Encounter> {
        let mut state = self.state.borrow_mut();
        if encounter.id.is_none() {
            encounter.id = Some(state.allocate_id());
        }
        for observation in &mut encounter.observations {
            if observation.id.is_none() {
                observation.id = Some(state.allocate_id());
            }
        }
        let position = state.encounters.iter().position(|e| e.uuid == encounter.uuid);
        match position {
            Some(index) => state.encounters[index] = encounter.clone(),
            None => state.encounters.push(encounter.clone()),
        }
        Ok(encounter)
    }
}

impl MessageLog for InMemoryDirectory {
    fn entries(&self, from_id: i64, to_id: i64) -> DirectoryResult<Vec<LogEntry>> {
        let mut entries: Vec<LogEntry> = self
            .state
            .borrow()
            .seed
            .message_log
            .iter()
            .filter(|entry| (from_id..=to_id).contains(&entry.id))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.id);
        Ok(entries)
    }
}
