mod common;

use intake_core::directory::Directories;
use intake_hl7::process_report_str;
use serde_json::{json, Value};

#[test]
fn risk_report_matches_golden() {
    let directory = common::directory();
    let raw = common::read_fixture("risk_report.hl7");

    let report = process_report_str(
        &raw,
        Directories::from(&directory),
        &common::config(),
        &common::context(),
    )
    .expect("report is processed");

    let actual: Vec<Value> = report
        .encounter
        .observations
        .iter()
        .map(|obs| {
            json!({
                "concept_id": obs.concept_id,
                "datetime": obs.datetime,
                "comment": obs.comment,
                "value": obs.value,
            })
        })
        .collect();

    let expected: Value = serde_json::from_str(&common::read_fixture("risk_report_observations.json"))
        .expect("golden is valid");

    assert_eq!(Value::Array(actual), expected);
}

#[test]
fn risk_report_builds_encounter_from_first_group() {
    let directory = common::directory();
    let raw = common::read_fixture("risk_report.hl7");

    let report = process_report_str(
        &raw,
        Directories::from(&directory),
        &common::config(),
        &common::context(),
    )
    .expect("report is processed");

    let encounter = &report.encounter;
    let encounter_id = encounter.id.expect("encounter saved");
    assert_eq!(encounter.patient_id, 1);
    assert_eq!(encounter.provider_id, Some(10));
    assert_eq!(encounter.location_id, Some(31));
    assert_eq!(encounter.datetime.to_string(), "2024-01-15 08:00:00");
    assert_eq!(encounter.creator, "intake-test");

    let types = directory.encounter_types();
    let risk = types
        .iter()
        .find(|t| t.id == encounter.encounter_type_id)
        .expect("encounter type exists");
    assert_eq!(risk.name, "RapidSMS Notification RISK");

    for obs in &encounter.observations {
        assert!(obs.id.is_some());
        assert_eq!(obs.person_id, 1);
        assert_eq!(obs.encounter_uuid, encounter.uuid);
        assert_eq!(obs.location_id, Some(31));
        assert_eq!(obs.creator, "intake-test");
    }

    let stored = directory.encounters();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], *encounter);

    let obr = report.acknowledgment.segment("OBR").expect("OBR echoed");
    assert_eq!(obr.component(3, 1), Some(encounter_id.to_string().as_str()));
}
