#![allow(dead_code)]

use std::fs;

use chrono::NaiveDate;
use intake_core::memory::{DirectorySeed, InMemoryDirectory};
use intake_core::{IntakeConfig, ProcessingContext};

pub fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

pub fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("fixture is readable")
}

pub fn seed() -> DirectorySeed {
    serde_json::from_str(&read_fixture("directory.json")).expect("directory seed is valid")
}

pub fn directory() -> InMemoryDirectory {
    InMemoryDirectory::from_seed(seed())
}

pub fn config() -> IntakeConfig {
    IntakeConfig::default()
}

pub fn context() -> ProcessingContext {
    let now = NaiveDate::from_ymd_opt(2024, 2, 1)
        .and_then(|date| date.and_hms_opt(12, 0, 0))
        .expect("valid clock");
    ProcessingContext::new("intake-test", now)
}

/// Report builder with sensible defaults; every part can be overridden.
pub struct Report {
    pub message_type: String,
    pub sending_application: String,
    pub facility: String,
    pub patient_ids: String,
    pub admission_type: String,
    pub attending: String,
    pub observation_datetime: String,
    pub observations: Vec<String>,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            message_type: "ORU^R01^ORU_R01".to_string(),
            sending_application: "RAPIDSMS".to_string(),
            facility: "434".to_string(),
            patient_ids: "ECID-1001^^^NIDA^ECID".to_string(),
            admission_type: "RISK".to_string(),
            attending: "PRV-7^Uwimana^Alice".to_string(),
            observation_datetime: "20240115080000".to_string(),
            observations: Vec::new(),
        }
    }
}

impl Report {
    pub fn with_observations(lines: &[&str]) -> Self {
        Self {
            observations: lines.iter().map(|line| line.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn encode(&self) -> String {
        let mut segments = vec![
            format!(
                "MSH|^~\\&|{}|{}|SHR|RWANDA|20240115083000||{}|CTRL-1|P|2.5",
                self.sending_application, self.facility, self.message_type
            ),
            format!("PID|||{}||Doe^Jane", self.patient_ids),
            format!("PV1|1|O||{}|||{}", self.admission_type, self.attending),
            format!("OBR|1||FILLER-1|NOTIF|||{}", self.observation_datetime),
        ];
        segments.extend(self.observations.iter().cloned());
        segments.join("\r")
    }
}
