mod common;

use common::{test_config, write, StubCollaborator};
use lab_report::{
    collab::OfflineCollaborator,
    metadata::{extract_metadata, metadata_from_text, parse_metadata_answer},
    report::LabMetadata,
};

#[test]
fn failed_service_yields_complete_defaults() {
    let meta = metadata_from_text(&OfflineCollaborator, "Lab 3: sorting");
    assert_eq!(meta, LabMetadata::fallback());
    assert!(!meta.title.is_empty());
    assert!(!meta.objectives.is_empty());
    assert!(!meta.exercises.is_empty());
}

#[test]
fn malformed_answer_yields_defaults() {
    let collab = StubCollaborator::with_metadata("Sure! Here is the title: Lab 3");
    assert_eq!(metadata_from_text(&collab, "..."), LabMetadata::fallback());
}

#[test]
fn fenced_json_answer_is_parsed() {
    let answer = "```json\n{\"title\": \"Sorting\", \"objectives\": [\"Learn\"], \"exercises\": [\"Bubble\", \"Merge\"]}\n```";
    let meta = parse_metadata_answer(answer).unwrap();
    assert_eq!(meta.title, "Sorting");
    assert_eq!(meta.exercises, vec!["Bubble", "Merge"]);
}

#[test]
fn blank_title_is_replaced() {
    let meta = parse_metadata_answer(r#"{"title": "  ", "exercises": ["A", ""]}"#).unwrap();
    assert_eq!(meta.title, "Lab Report");
    assert_eq!(meta.exercises, vec!["A"]);
    assert_eq!(meta.objectives, LabMetadata::fallback().objectives);
}

#[test]
fn missing_lists_get_generic_entries() {
    let meta = parse_metadata_answer(r#"{"title": "Lab 3"}"#).unwrap();
    let fallback = LabMetadata::fallback();
    assert_eq!(meta.title, "Lab 3");
    assert_eq!(meta.objectives, fallback.objectives);
    assert_eq!(meta.exercises, fallback.exercises);

    let meta = parse_metadata_answer(r#"{"title": "Lab 3", "objectives": [" "], "exercises": []}"#)
        .unwrap();
    assert!(!meta.objectives.is_empty());
    assert!(!meta.exercises.is_empty());
}

#[test]
fn unreadable_instruction_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let docx = write(dir.path(), "brief.docx", "PK");
    assert!(extract_metadata(&cfg, &OfflineCollaborator, &docx).is_err());
    assert!(extract_metadata(&cfg, &OfflineCollaborator, &dir.path().join("missing.txt")).is_err());
}

#[test]
fn binary_instruction_with_failed_extraction_still_gets_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let pdf = write(dir.path(), "brief.pdf", "%PDF-1.4");
    let collab = StubCollaborator {
        fail_extract_text: true,
        ..Default::default()
    };
    let meta = extract_metadata(&cfg, &collab, &pdf).unwrap();
    assert_eq!(meta, LabMetadata::fallback());
}

#[test]
fn section_heading_is_positional() {
    let meta = LabMetadata {
        title: "T".into(),
        objectives: vec![],
        exercises: vec!["One".into(), "Two".into()],
    };
    assert_eq!(meta.section_heading(0), "Exercise: One");
    assert_eq!(meta.section_heading(1), "Exercise: Two");
    assert_eq!(meta.section_heading(2), "Code Sample 3");
}
