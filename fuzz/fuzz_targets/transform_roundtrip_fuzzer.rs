//! Fuzz target for the XOR transform
//!
//! # Strategy
//!
//! - Structured configs: arbitrary seeds, operands (including `/0`),
//!   negative coefficients and degenerate bounds
//! - Arbitrary payloads and intensities
//!
//! # Invariants
//!
//! - Transform never panics on a valid config
//! - Output length equals input length
//! - Applying the transform twice at the same intensity restores the input
//! - Every evaluated value lies in `[min, max)`, or is `min` when degenerate
//! - Only a zero divisor poisons an index

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use nasm_engine::{CipherConfig, OperationSpec, RecurrenceEvaluator, transform};

#[derive(Debug, Arbitrary)]
struct Input {
    seeds: Vec<i32>,
    operations: Vec<(OpChoice, i16)>,
    coefficients: Vec<i16>,
    min_bound: i16,
    width: i16,
    intensity: u8,
    payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum OpChoice {
    Add,
    Sub,
    Mul,
    Div,
}

impl OpChoice {
    fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
        }
    }
}

fuzz_target!(|input: Input| {
    if input.seeds.is_empty()
        || input.seeds.len() > 16
        || input.operations.is_empty()
        || input.coefficients.is_empty()
        || input.payload.len() > 16 * 1024
    {
        return;
    }

    let config = CipherConfig {
        name: "fuzz".to_string(),
        degree: input.seeds.len(),
        seeds: input.seeds.iter().map(|&seed| f64::from(seed)).collect(),
        operations: input
            .operations
            .iter()
            .map(|(op, operand)| OperationSpec::new("f", format!("{}{operand}", op.symbol())))
            .collect(),
        transform_coefficients: input.coefficients.iter().map(|&c| i64::from(c)).collect(),
        min_bound: i64::from(input.min_bound),
        max_bound: i64::from(input.min_bound) + i64::from(input.width),
    };
    let intensity = u32::from(input.intensity % 8) + 1;

    let once = transform(&input.payload, &config, intensity, |_| {}).unwrap();
    assert_eq!(once.len(), input.payload.len());

    let twice = transform(&once, &config, intensity, |_| {}).unwrap();
    assert_eq!(twice, input.payload);

    let divides_by_zero = input.operations.iter().any(|&(op, operand)| {
        matches!(op, OpChoice::Div) && operand == 0
    });
    let mut evaluator = RecurrenceEvaluator::new(&config).unwrap();
    for x in 0..256 {
        let Some(value) = evaluator.evaluate(x) else {
            assert!(divides_by_zero);
            continue;
        };
        if config.is_degenerate() {
            assert_eq!(value, config.min_bound);
        } else {
            assert!((config.min_bound..config.max_bound).contains(&value));
        }
    }
});
