//! Fuzz target for opening sealed buffers
//!
//! Arbitrary bytes as a sealed buffer. Opening must never panic: short input
//! is `TruncatedHeader`, anything else opens to `len - HEADER_SIZE` bytes and
//! seals back to the same buffer.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nasm_engine::{CipherConfig, EngineError, HEADER_SIZE, OperationSpec, SealHeader, open, seal};

fuzz_target!(|data: &[u8]| {
    let config = CipherConfig {
        name: "fuzz".to_string(),
        degree: 3,
        seeds: vec![40.0, 77.0, 101.0],
        operations: vec![
            OperationSpec::new("a", "+13"),
            OperationSpec::new("b", "*7"),
            OperationSpec::new("c", "/5"),
        ],
        transform_coefficients: vec![2, 9, 4],
        min_bound: 32,
        max_bound: 126,
    };

    match open(data, &config, 2, |_| {}) {
        Ok(opened) => {
            assert_eq!(opened.len() + HEADER_SIZE, data.len());
            let header = SealHeader::decode(data).unwrap();
            let resealed = seal(&opened, &config, 2, header, |_| {}).unwrap();
            assert_eq!(resealed, data);
        },
        Err(EngineError::TruncatedHeader { actual, .. }) => {
            assert!(actual < HEADER_SIZE);
        },
        Err(err) => panic!("unexpected error: {err}"),
    }
});
