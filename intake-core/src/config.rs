//! Intake configuration.
//!
//! Resolved once by the caller and passed into the pipeline; the library never
//! reads the environment while processing a message.

use serde::{Deserialize, Serialize};

/// Integration constants and identity conventions used while processing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntakeConfig {
    /// Message structure accepted by the processor (`ORU_R01`).
    pub report_message_type: String,
    /// Identifier type used to look patients up.
    pub patient_identifier_type: String,
    /// Person attribute holding the provider's external id.
    pub provider_id_attribute: String,
    pub role_attribute: String,
    pub provider_role: String,
    /// Gender recorded on auto-created providers.
    pub placeholder_gender: String,
    /// Coded value identifier marking a concept proposal.
    pub proposal_identifier: String,
    /// Alternate coding system marking a local drug reference.
    pub local_drug_system: String,
    /// Sending application accepted by the replay driver.
    pub sending_application: String,
    /// Admission types the replay driver forwards to the processor.
    pub replay_admission_types: Vec<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            report_message_type: "ORU_R01".to_string(),
            patient_identifier_type: "ECID".to_string(),
            provider_id_attribute: "EPID".to_string(),
            role_attribute: "Role".to_string(),
            provider_role: "Provider".to_string(),
            placeholder_gender: "N/A".to_string(),
            proposal_identifier: "PROPOSED".to_string(),
            local_drug_system: "99RX".to_string(),
            sending_application: "RAPIDSMS".to_string(),
            replay_admission_types: vec!["RISK".to_string(), "MAT".to_string()],
        }
    }
}

impl IntakeConfig {
    pub fn replays_admission_type(&self, admission_type: &str) -> bool {
        self.replay_admission_types
            .iter()
            .any(|candidate| candidate == admission_type)
    }
}
