//! Fuzz target for key config parsing
//!
//! Arbitrary bytes as a JSON key record. Parsing must never panic: every bad
//! record is a `ConfigError`. Any record that parses must also build an
//! evaluator, and produce a keystream when its bounds are small enough for
//! the fed-back indices to stay cheap.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nasm_engine::{CipherConfig, RecurrenceEvaluator};

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = CipherConfig::from_json(json) else {
        return;
    };

    let Ok(mut evaluator) = RecurrenceEvaluator::new(&config) else {
        panic!("validated config rejected by evaluator: {config:?}");
    };
    if config.min_bound.unsigned_abs() > 1 << 20 || config.max_bound.unsigned_abs() > 1 << 20 {
        return;
    }
    let bytes: Vec<u8> = evaluator.keystream(64, 2).collect();
    assert_eq!(bytes.len(), 64);
});
