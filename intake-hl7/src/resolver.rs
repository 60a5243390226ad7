//! Resolution of the identities a report refers to.
//!
//! Patients and locations are only matched. Providers and encounter types are
//! created in the directory when the message names one that does not exist.

use intake_core::directory::Directories;
use intake_core::{
    EncounterType, IntakeConfig, Location, NewPerson, Patient, Person, PersonAttribute,
    ProcessingError, ProcessingResult,
};
use tracing::{debug, info};

use crate::navigator::{HeaderView, PatientIdentifierView, VisitView};

const ENCOUNTER_TYPE_NAMES: [(&str, &str); 3] = [
    ("BIR", "RapidSMS Notification BIRTH"),
    ("RISK", "RapidSMS Notification RISK"),
    ("MAT", "RapidSMS Notification Maternal Death"),
];

const EPID_DESCRIPTION: &str = "Stores the EPID of the Provider";
const ROLE_DESCRIPTION: &str = "Stores the Role of the Person object";

pub struct IdentityResolver<'a> {
    directories: Directories<'a>,
    config: &'a IntakeConfig,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(directories: Directories<'a>, config: &'a IntakeConfig) -> Self {
        Self {
            directories,
            config,
        }
    }

    /// Exactly one patient must carry the message's identifier.
    ///
    /// The identifier typed with the configured type is preferred; otherwise
    /// the first PID-3 identifier is looked up under that type. Zero and
    /// multiple matches both fail.
    pub fn resolve_patient(&self, identifiers: &[PatientIdentifierView]) -> ProcessingResult<Patient> {
        let identifier_type = &self.config.patient_identifier_type;
        let identifier = identifiers
            .iter()
            .find(|id| id.identifier_type.as_deref() == Some(identifier_type.as_str()))
            .or_else(|| identifiers.first())
            .map(|id| id.value.clone())
            .unwrap_or_default();

        let mut patients = if identifier.is_empty() {
            Vec::new()
        } else {
            self.directories
                .patients
                .find_by_identifier(identifier_type, &identifier)?
        };

        if patients.len() != 1 {
            return Err(ProcessingError::PatientNotResolved {
                identifier_type: identifier_type.clone(),
                identifier,
                matches: patients.len(),
            });
        }
        let patient = patients.remove(0);
        debug!(patient_id = patient.id, "resolved patient");
        Ok(patient)
    }

    /// Look the attending provider up by the configured id attribute (EPID by
    /// default), creating the person if unknown.
    ///
    /// A visit without a provider id yields `None` without any lookup.
    pub fn resolve_provider(&self, visit: &VisitView) -> ProcessingResult<Option<Person>> {
        let Some(doctor) = visit.attending.as_ref() else {
            return Ok(None);
        };
        let Some(provider_id) = doctor.id.as_deref() else {
            return Ok(None);
        };

        let persons = self.directories.persons;
        let id_attribute = self.config.provider_id_attribute.as_str();
        if let Some(existing) = persons.find_by_attribute(id_attribute, provider_id)? {
            debug!(person_id = existing.id, "resolved provider");
            return Ok(Some(existing));
        }

        info!(
            provider_id,
            "provider id does not match any person, creating a new provider"
        );
        let epid = persons.ensure_attribute_type(id_attribute, EPID_DESCRIPTION)?;
        let role = persons.ensure_attribute_type(&self.config.role_attribute, ROLE_DESCRIPTION)?;

        let created = persons.create_person(NewPerson {
            given_name: doctor.given_name.clone(),
            family_name: doctor.family_name.clone(),
            gender: self.config.placeholder_gender.clone(),
            attributes: vec![
                PersonAttribute {
                    attribute_type: epid.name,
                    value: provider_id.to_string(),
                },
                PersonAttribute {
                    attribute_type: role.name,
                    value: self.config.provider_role.clone(),
                },
            ],
        })?;
        Ok(Some(created))
    }

    /// Match the sending facility against location descriptions.
    ///
    /// Every location is scanned and the last match wins when several
    /// descriptions carry the same facility id.
    pub fn resolve_location(&self, header: &HeaderView) -> ProcessingResult<Option<Location>> {
        let Some(facility) = header.sending_facility.as_deref() else {
            return Ok(None);
        };

        let mut matched = None;
        for location in self.directories.locations.list_all()? {
            let external_id = location.description.as_deref().and_then(facility_external_id);
            if external_id == Some(facility) {
                matched = Some(location);
            }
        }

        if matched.is_none() {
            debug!(facility, "no location matches the sending facility");
        }
        Ok(matched)
    }

    /// Map the admission type to an encounter type, creating it when absent.
    pub fn resolve_encounter_type(&self, visit: &VisitView) -> ProcessingResult<EncounterType> {
        let code = visit
            .admission_type
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| {
                ProcessingError::MalformedMessage("PV1-4 admission type is empty".to_string())
            })?;
        let name = encounter_type_name(code);

        let types = self.directories.encounter_types;
        if let Some(existing) = types.find_by_name(name)? {
            return Ok(existing);
        }

        info!(name, "creating encounter type");
        let description = format!("{name} Encounter type created by Rsms notification");
        Ok(types.create(name, &description)?)
    }
}

/// Encounter type name for an admission type code; unknown codes map to
/// themselves.
pub fn encounter_type_name(code: &str) -> &str {
    ENCOUNTER_TYPE_NAMES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

/// External facility id carried by a location description: the trimmed text
/// after the first colon.
pub fn facility_external_id(description: &str) -> Option<&str> {
    description
        .split_once(':')
        .map(|(_, external_id)| external_id.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_admission_types_are_renamed() {
        assert_eq!(encounter_type_name("BIR"), "RapidSMS Notification BIRTH");
        assert_eq!(encounter_type_name("RISK"), "RapidSMS Notification RISK");
        assert_eq!(
            encounter_type_name("MAT"),
            "RapidSMS Notification Maternal Death"
        );
        assert_eq!(encounter_type_name("ANC"), "ANC");
    }

    #[test]
    fn facility_id_is_text_after_first_colon() {
        assert_eq!(facility_external_id("FOSAID: 434 "), Some("434"));
        assert_eq!(facility_external_id("a:b:c"), Some("b:c"));
        assert_eq!(facility_external_id("no colon"), None);
    }
}
