use lab_report::{
    config::Config,
    postprocess::normalize_extracted_text,
    runner::shim::{figure_index, figure_name},
    util::{sanitize_component, truncate_chars},
};

#[test]
fn truncate_counts_characters() {
    assert_eq!(truncate_chars("héllo", 2), "hé...");
    assert_eq!(truncate_chars("abc", 3), "abc");
    assert_eq!(truncate_chars("", 0), "");
}

#[test]
fn sanitize_replaces_separators() {
    assert_eq!(sanitize_component("my lab.v2"), "my_lab_v2");
    assert_eq!(sanitize_component(""), "file");
}

#[test]
fn figure_names_round_trip_through_the_pattern() {
    assert_eq!(figure_index(&figure_name(12)), Some(12));
    assert_eq!(figure_index("figure_.png"), None);
    assert_eq!(figure_index("my_figure_1.png"), None);
    assert_eq!(figure_index("figure_1.png.bak"), None);
}

#[test]
fn extracted_text_is_normalized() {
    let cfg = Config::default();
    let raw = "\u{feff}Lab\u{0002} 1   \r\nObjective: ﬁt data\t\r\n";
    assert_eq!(normalize_extracted_text(&cfg, raw), "Lab 1\nObjective: fit data");
}
