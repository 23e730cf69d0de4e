//! Multi-writer, multi-reader stress scenario: 5 writers each push 1000
//! bytes in randomized chunks, prefixed by a `{writer_id, length}` header;
//! 8 BLOCKING readers each with a randomized completion delay. Every reader
//! must reconstruct every writer's `0, 1, .., 999 (mod 256)` stream exactly.

use testsuite::{StressConfig, run_stress};

#[test]
fn multi_writer_multi_reader_stress() {
    run_stress(&StressConfig::default()).unwrap();
}
