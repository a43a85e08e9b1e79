mod common;

use common::{notebook, test_config, write, StubCollaborator};
use lab_report::{
    collab::OfflineCollaborator,
    error::ExtractionError,
    extract::{extract_instruction_text, notebook_code_from_str, read_source_file},
    report::Language,
};

#[test]
fn concatenates_code_cells_in_order() {
    let raw = notebook(&[
        ("markdown", "# Title"),
        ("code", "x = 1"),
        ("raw", "ignored"),
        ("code", "print(x)"),
    ]);
    let code = notebook_code_from_str(&raw).unwrap();
    assert_eq!(code, "x = 1\n\nprint(x)\n\n");
}

#[test]
fn accepts_list_sources() {
    let raw = r#"{"cells":[{"cell_type":"code","source":["a = 1\n","b = 2"]}]}"#;
    assert_eq!(notebook_code_from_str(raw).unwrap(), "a = 1\nb = 2\n\n");
}

#[test]
fn rejects_non_notebooks() {
    assert!(notebook_code_from_str("not json").is_err());
    let err = notebook_code_from_str(r#"{"metadata":{}}"#).unwrap_err();
    assert!(err.contains("cells"));
}

#[test]
fn reads_notebook_as_python_source() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let path = write(dir.path(), "lab.ipynb", &notebook(&[("code", "print('hi')")]));
    let src = read_source_file(&cfg, &path).unwrap();
    assert_eq!(src.language, Language::Python);
    assert_eq!(src.content, "print('hi')\n\n");
}

#[test]
fn invalid_notebook_is_an_extraction_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let path = write(dir.path(), "broken.ipynb", "{");
    let err = read_source_file(&cfg, &path).unwrap_err();
    assert!(matches!(err, ExtractionError::InvalidNotebook { .. }));
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let path = write(dir.path(), "data.bin", "\u{0}\u{1}");
    let err = read_source_file(&cfg, &path).unwrap_err();
    assert!(matches!(err, ExtractionError::Unsupported { ref ext, .. } if ext == "bin"));
}

#[test]
fn language_tags_follow_extension() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let java = write(dir.path(), "Main.java", "class Main {}");
    let text = write(dir.path(), "notes.txt", "hello");
    assert_eq!(read_source_file(&cfg, &java).unwrap().language.tag(), "java");
    assert_eq!(read_source_file(&cfg, &text).unwrap().language.tag(), "text");
}

#[test]
fn instruction_text_is_read_and_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let path = write(dir.path(), "lab.md", "\u{feff}Lab 3  \r\nPlot a sine\r\n");
    let text = extract_instruction_text(&cfg, &OfflineCollaborator, &path).unwrap();
    assert_eq!(text, "Lab 3\nPlot a sine");
}

#[test]
fn binary_instruction_is_delegated() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let path = write(dir.path(), "lab.pdf", "%PDF-1.4");
    let text = extract_instruction_text(&cfg, &StubCollaborator::default(), &path).unwrap();
    assert_eq!(text, "extracted 8 bytes of application/pdf");
}

#[test]
fn failed_delegation_yields_empty_text() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let path = write(dir.path(), "lab.png", "not really an image");
    let text = extract_instruction_text(&cfg, &OfflineCollaborator, &path).unwrap();
    assert!(text.is_empty());
}

#[test]
fn unknown_instruction_format_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let path = write(dir.path(), "lab.docx", "zip");
    let err = extract_instruction_text(&cfg, &OfflineCollaborator, &path).unwrap_err();
    assert!(matches!(err, ExtractionError::Unsupported { .. }));
}
