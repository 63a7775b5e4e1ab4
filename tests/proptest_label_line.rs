use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use yolo_ingest::yolo::parse_label_line;

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(256);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config
}

fn coord() -> impl Strategy<Value = f64> {
    -2.0f64..2.0
}

fn separator() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(" "), Just("  "), Just("\t"), Just(" \t ")]
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn well_formed_lines_parse_exactly(
        class_id in any::<u32>(),
        cx in coord(),
        cy in coord(),
        w in coord(),
        h in coord(),
        sep in separator(),
    ) {
        let line = [
            class_id.to_string(),
            cx.to_string(),
            cy.to_string(),
            w.to_string(),
            h.to_string(),
        ]
        .join(sep);

        let row = parse_label_line(&format!("  {line}\r")).expect("well-formed line parses");
        prop_assert_eq!(row.class_id, class_id);
        prop_assert_eq!(row.bbox.to_array(), [cx, cy, w, h]);
    }

    #[test]
    fn wrong_token_counts_are_rejected(
        values in prop::collection::vec(0.0f64..1.0, 0..12)
            .prop_filter("not five tokens", |v| v.len() != 5),
    ) {
        let line = values
            .iter()
            .map(f64::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        prop_assert!(parse_label_line(&line).is_none());
    }

    #[test]
    fn negative_class_ids_are_rejected(class_id in 1u32..1_000_000, rest in coord()) {
        let line = format!("-{class_id} {rest} {rest} {rest} {rest}");
        prop_assert!(parse_label_line(&line).is_none());
    }

    #[test]
    fn fractional_class_ids_truncate(whole in 0u32..10_000, frac in 0u32..1000) {
        let line = format!("{whole}.{frac:03} 0.5 0.5 0.1 0.1");
        let row = parse_label_line(&line).expect("fractional id parses");
        prop_assert_eq!(row.class_id, whole);
    }

    #[test]
    fn arbitrary_input_never_panics(line in "\\PC{0,64}") {
        if parse_label_line(&line).is_some() {
            prop_assert_eq!(line.split_whitespace().count(), 5);
        }
    }
}
