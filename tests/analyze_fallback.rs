mod common;

use common::StubCollaborator;
use lab_report::{
    analyze::{analyze, strip_code_fences},
    collab::OfflineCollaborator,
    report::{IsolationOutcome, Language},
};

const CODE: &str = "def f():\n    return 1\n\nprint(f())\n";

#[test]
fn strips_surrounding_fences_only() {
    assert_eq!(strip_code_fences("```python\nx = 1\n```"), "x = 1");
    assert_eq!(strip_code_fences("x = 1"), "x = 1");
    assert_eq!(strip_code_fences("```\na\n```\n"), "a");
}

#[test]
fn isolates_block_for_exercise() {
    let a = analyze(&StubCollaborator::default(), "f.py", CODE, Language::Python, Some("Ex 1"));
    assert_eq!(a.isolation, IsolationOutcome::Isolated);
    assert_eq!(a.isolated_block, "# Ex 1\ndef f():");
    assert_eq!(a.full_code, CODE);
    assert_eq!(a.explanation, "Explains 2 line(s) of python.");
}

#[test]
fn no_label_means_full_source() {
    let a = analyze(&StubCollaborator::default(), "f.py", CODE, Language::Python, None);
    assert_eq!(a.isolation, IsolationOutcome::NotRequested);
    assert_eq!(a.isolated_block, CODE);
}

#[test]
fn isolation_failure_still_explains_full_source() {
    let collab = StubCollaborator {
        fail_isolation: true,
        ..Default::default()
    };
    let a = analyze(&collab, "f.py", CODE, Language::Python, Some("Ex 1"));
    assert!(matches!(a.isolation, IsolationOutcome::Fallback(ref c) if c.contains("timeout")));
    assert_eq!(a.isolated_block, CODE);
    assert_eq!(a.explanation, "Explains 4 line(s) of python.");
}

#[test]
fn both_phases_failing_degrade_to_placeholders() {
    let a = analyze(&OfflineCollaborator, "f.c", "int main(){}", Language::C, Some("Ex"));
    assert_eq!(a.isolated_block, "int main(){}");
    assert!(a.explanation.starts_with("Error analyzing code: "));
    assert!(a.explanation.contains("offline"));
}
