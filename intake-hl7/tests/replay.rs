mod common;

use common::Report;
use intake_core::directory::{Directories, LogEntry};
use intake_core::memory::{DirectorySeed, InMemoryDirectory};
use intake_hl7::{replay, Hl7Parser, ReplaySummary, ReportProcessor};

fn entry(id: i64, report: Option<Report>) -> LogEntry {
    LogEntry {
        id,
        payload: report.map(|report| report.encode()),
    }
}

fn report(admission_type: &str) -> Report {
    Report {
        admission_type: admission_type.to_string(),
        ..Report::with_observations(&["OBX|1|NM|5089^WEIGHT^RW_CN||60"])
    }
}

fn seeded_log() -> InMemoryDirectory {
    let mut log = vec![
        entry(1, Some(report("RISK"))),
        entry(2, None),
        entry(3, Some(report("BIR"))),
        entry(
            4,
            Some(Report {
                sending_application: "OPENMRS".to_string(),
                ..report("RISK")
            }),
        ),
        entry(
            5,
            Some(Report {
                patient_ids: "ECID-4040^^^NIDA^ECID".to_string(),
                ..report("MAT")
            }),
        ),
        LogEntry {
            id: 6,
            payload: Some("not an hl7 message".to_string()),
        },
        entry(7, Some(report("MAT"))),
        entry(8, Some(report("RISK"))),
    ];
    log.reverse();

    InMemoryDirectory::from_seed(DirectorySeed {
        message_log: log,
        ..common::seed()
    })
}

#[test]
fn replay_processes_matching_entries_and_continues_past_failures() {
    let directory = seeded_log();
    let config = common::config();
    let processor = ReportProcessor::new(Directories::from(&directory), &config);

    let summary = replay(&directory, 1, 7, &Hl7Parser, &processor, &common::context())
        .expect("log is readable");

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.skipped, 3);
    let failed: Vec<i64> = summary.failures.iter().map(|f| f.entry_id).collect();
    assert_eq!(failed, vec![5, 6]);
    assert!(summary.failures[0].error.contains("ECID-4040"));

    let encounters = directory.encounters();
    assert_eq!(encounters.len(), 2);
    assert_eq!(encounters[1].encounter_type_id, 40);
}

#[test]
fn replaying_twice_saves_again() {
    let directory = seeded_log();
    let config = common::config();
    let processor = ReportProcessor::new(Directories::from(&directory), &config);
    let context = common::context();

    replay(&directory, 1, 1, &Hl7Parser, &processor, &context).unwrap();
    replay(&directory, 1, 1, &Hl7Parser, &processor, &context).unwrap();

    let encounters = directory.encounters();
    assert_eq!(encounters.len(), 2);
    assert_ne!(encounters[0].id, encounters[1].id);
}

#[test]
fn empty_range_does_nothing() {
    let directory = seeded_log();
    let config = common::config();
    let processor = ReportProcessor::new(Directories::from(&directory), &config);

    let summary = replay(&directory, 20, 30, &Hl7Parser, &processor, &common::context()).unwrap();
    assert_eq!(summary, ReplaySummary::default());
    assert!(directory.encounters().is_empty());
}
