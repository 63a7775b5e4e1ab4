//! Fuzz target for YOLO single-line label parsing.
//!
//! Feeds arbitrary UTF-8 lines to the label line parser and checks that any
//! accepted line really had five tokens.

#![no_main]

use libfuzzer_sys::fuzz_target;
use yolo_ingest::yolo::parse_label_line;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    if parse_label_line(line).is_some() {
        assert_eq!(line.split_whitespace().count(), 5);
    }
});
