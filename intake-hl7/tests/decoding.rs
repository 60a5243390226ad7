mod common;

use common::Report;
use intake_core::directory::Directories;
use intake_core::memory::InMemoryDirectory;
use intake_core::{ConceptNameRef, ObsValue, ProcessingError, ProcessingResult};
use intake_hl7::{process_report_str, ProcessedReport};

fn process(directory: &InMemoryDirectory, observations: &[&str]) -> ProcessingResult<ProcessedReport> {
    let raw = Report::with_observations(observations).encode();
    process_report_str(
        &raw,
        Directories::from(directory),
        &common::config(),
        &common::context(),
    )
}

/// Value of the single observation produced by one OBX line.
fn single_value(obx: &str) -> ObsValue {
    let directory = common::directory();
    let report = process(&directory, &[obx]).expect("report is processed");
    assert_eq!(report.encounter.observations.len(), 1);
    report.encounter.observations[0].value.clone()
}

fn failure(obx: &str) -> ProcessingError {
    let directory = common::directory();
    let err = process(&directory, &[obx]).expect_err("report is rejected");
    assert!(directory.encounters().is_empty());
    err
}

#[test]
fn numeric_values_are_decoded() {
    assert_eq!(
        single_value("OBX|1|NM|5089^WEIGHT^RW_CN||72.5"),
        ObsValue::Numeric { value: 72.5 }
    );
}

#[test]
fn zero_and_one_follow_the_concept_datatype() {
    assert_eq!(
        single_value("OBX|1|NM|1755^PREGNANT^RW_CN||1"),
        ObsValue::Boolean { value: true }
    );
    assert_eq!(
        single_value("OBX|1|NM|1755^PREGNANT^RW_CN||0"),
        ObsValue::Boolean { value: false }
    );
    assert_eq!(
        single_value("OBX|1|NM|5089^WEIGHT^RW_CN||1"),
        ObsValue::Numeric { value: 1.0 }
    );
    assert_eq!(
        single_value("OBX|1|NM|2169^HIV TEST^RW_CN||1"),
        ObsValue::Coded {
            concept_id: 1065,
            name: None
        }
    );
    assert_eq!(
        single_value("OBX|1|NM|2169^HIV TEST^RW_CN||0"),
        ObsValue::Coded {
            concept_id: 1066,
            name: None
        }
    );
}

#[test]
fn flag_outside_coded_answers_is_rejected() {
    let err = failure("OBX|1|NM|1001^RISK FLAG^RW_CN||1");
    assert!(matches!(
        err,
        ProcessingError::InvalidAnswer {
            concept_id: 108,
            answer_id: 1065
        }
    ));
}

#[test]
fn flag_on_text_concept_is_rejected() {
    let err = failure("OBX|1|NM|1002^GRAVIDA NOTE^RW_CN||1");
    match err {
        ProcessingError::UnsupportedBooleanTarget {
            concept_id,
            datatype,
        } => {
            assert_eq!(concept_id, 109);
            assert_eq!(datatype, "text");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unparseable_number_names_message_and_concept() {
    let err = failure("OBX|1|NM|5089^WEIGHT^RW_CN||abc");
    match err {
        ProcessingError::InvalidNumericValue {
            value,
            concept_id,
            message_id,
        } => {
            assert_eq!(value, "abc");
            assert_eq!(concept_id, 100);
            assert_eq!(message_id, "CTRL-1");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_values_are_dropped() {
    let directory = common::directory();
    let report = process(
        &directory,
        &[
            "OBX|1|NM|5089^WEIGHT^RW_CN||",
            "OBX|2|DT|5596^DELIVERY DATE^RW_CN",
            "OBX|3|DT|5596^DELIVERY DATE^RW_CN||20241340",
            "OBX|4|ST|161011^REMARKS^RW_CN||42",
        ],
    )
    .expect("report is processed");

    let observations = &report.encounter.observations;
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].concept_id, 105);
    assert_eq!(directory.encounters().len(), 1);
}

#[test]
fn malformed_timestamps_are_dropped() {
    let directory = common::directory();
    let report = process(
        &directory,
        &[
            "OBX|1|TS|1003^LAST VISIT^RW_CN||2023-12-20",
            "OBX|2|TS|1003^LAST VISIT^RW_CN||20231220 1015",
            "OBX|3|TS|1003^LAST VISIT^RW_CN||20231220-0500",
            "OBX|4|NM|5089^WEIGHT^RW_CN||60|kg|||||F|||2024-01-15",
        ],
    )
    .expect("report is processed");

    let observations = &report.encounter.observations;
    assert_eq!(observations.len(), 2);
    assert_eq!(
        observations[0].value,
        ObsValue::Datetime {
            value: chrono::NaiveDate::from_ymd_opt(2023, 12, 20)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .unwrap()
        }
    );
    // A garbled OBX-14 falls back to the encounter datetime.
    assert_eq!(observations[1].datetime, report.encounter.datetime);
    assert_eq!(observations[1].datetime.to_string(), "2024-01-15 08:00:00");
}

#[test]
fn unsupported_datatype_aborts_without_saving() {
    let err = failure("OBX|1|SN|5089^WEIGHT^RW_CN||>^5");
    assert!(matches!(err, ProcessingError::UnsupportedDatatype(ref tag) if tag == "SN"));
}

#[test]
fn valueless_observation_is_dropped_before_datatype_check() {
    let directory = common::directory();
    let report = process(&directory, &["OBX|1|SN|5089^WEIGHT^RW_CN||"]).expect("report is processed");
    assert!(report.encounter.observations.is_empty());
}

#[test]
fn unmapped_observation_concept_is_fatal() {
    let err = failure("OBX|1|NM|9999^UNKNOWN^RW_CN||5");
    match err {
        ProcessingError::ConceptNotFound {
            code,
            coding_system,
        } => {
            assert_eq!(code, "9999");
            assert_eq!(coding_system, "RW_CN");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn proposals_are_flagged() {
    for obx in [
        "OBX|1|CWE|6042^DANGER SIGN^RW_CN||PROPOSED^Swollen feet^RW_CN",
        "OBX|1|CE|6042^DANGER SIGN^RW_CN||PROPOSED^Swollen feet^RW_CN",
    ] {
        let err = failure(obx);
        assert!(err.is_concept_proposal());
        match err {
            ProcessingError::ConceptProposal {
                concept,
                proposed_name,
            } => {
                assert_eq!(concept.id, 103);
                assert_eq!(proposed_name, "Swollen feet");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[test]
fn coded_entry_requires_numeric_identifier() {
    let err = failure("OBX|1|CE|6042^DANGER SIGN^RW_CN||ABC^FEVER^RW_CN");
    match err {
        ProcessingError::InvalidConceptId { identifier, name } => {
            assert_eq!(identifier, "ABC");
            assert_eq!(name, "FEVER");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn local_drug_requires_numeric_drug_id() {
    let err = failure("OBX|1|CWE|6042^DANGER SIGN^RW_CN||111^BLEEDING^RW_CN^X1^Drug^99RX");
    match err {
        ProcessingError::InvalidConceptId { identifier, name } => {
            assert_eq!(identifier, "X1");
            assert_eq!(name, "BLEEDING");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn alternate_identifier_names_the_coded_answer() {
    assert_eq!(
        single_value("OBX|1|CWE|6042^DANGER SIGN^RW_CN||111^BLEEDING^RW_CN^7001^Hemorrhage^LOCAL"),
        ObsValue::Coded {
            concept_id: 111,
            name: Some(ConceptNameRef {
                id: Some(7001),
                name: Some("Hemorrhage".to_string()),
            }),
        }
    );
    assert_eq!(
        single_value("OBX|1|CWE|6042^DANGER SIGN^RW_CN||111^BLEEDING^RW_CN^HX^Hemorrhage^LOCAL"),
        ObsValue::Coded {
            concept_id: 111,
            name: None
        }
    );
}

#[test]
fn coded_value_falls_back_to_identifier_for_lookup() {
    assert_eq!(
        single_value("OBX|1|CWE|6042^DANGER SIGN^RW_CN||fever"),
        ObsValue::Coded {
            concept_id: 110,
            name: None
        }
    );
}

#[test]
fn comments_attach_to_preceding_observation() {
    let directory = common::directory();
    let report = process(
        &directory,
        &[
            "OBX|1|NM|5089^WEIGHT^RW_CN||60",
            "NTE|1||Weighed",
            "NTE|2||",
            "NTE|3||after meal",
            "OBX|2|NM|5089^WEIGHT^RW_CN||61",
            "SPM|1",
            "NTE|1||orphan",
        ],
    )
    .expect("report is processed");

    let comments: Vec<Option<&str>> = report
        .encounter
        .observations
        .iter()
        .map(|obs| obs.comment.as_deref())
        .collect();
    assert_eq!(comments, vec![Some("Weighed after meal"), None]);
}
