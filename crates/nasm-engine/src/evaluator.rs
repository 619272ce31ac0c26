//! Memoized recurrence evaluator
//!
//! Evaluates the bounded sequence
//!
//! ```text
//! f(x) = 0                                   x < 0
//! f(x) = bound(seeds[x])                     0 <= x < d
//! f(x) = bound(ops[sel(x)](f(x - d)))        x >= d
//!
//! sel(x)   = (x - d + ntc(x)) mod |ops|
//! ntc(x)   = sum of TC[v mod |TC|] for v in 0 .. x - d
//! bound(r) = min + (floor(r) - min) mod (max - min)
//! ```
//!
//! A non-finite raw value (`/0`, overflow, a non-finite seed) has no bounded
//! value. The index is poisoned, and so is every index whose chain passes
//! through it. Poisoned indices evaluate to `None`.
//!
//! The dependency chain of `x` is `x, x - d, x - 2d, ...`, so evaluation
//! walks that chain down to the first known value and folds back up, storing
//! every intermediate result. Depth is bounded by the memo table, never by
//! the call stack.

use std::collections::HashMap;

use crate::{
    config::{CipherConfig, Operation},
    error::ConfigError,
};

/// Single-use evaluator for one config.
///
/// The memo table is keyed by index only, so an evaluator must never be
/// shared between configs. Construct one per transform and drop it after.
#[derive(Debug)]
pub struct RecurrenceEvaluator {
    degree: i64,
    seeds: Vec<f64>,
    operations: Vec<Operation>,
    coefficients: CoefficientTable,
    min_bound: i64,
    /// `max - min` in floating point; meaningless when degenerate
    range: f64,
    degenerate: bool,
    /// `None` marks a poisoned index
    cache: HashMap<i64, Option<i64>>,
}

impl RecurrenceEvaluator {
    /// Validate `config` and compile its operations.
    ///
    /// # Errors
    ///
    /// - Any [`ConfigError`] from [`CipherConfig::compile_operations`]
    pub fn new(config: &CipherConfig) -> Result<Self, ConfigError> {
        let operations = config.compile_operations()?;
        let coefficients = CoefficientTable::new(&config.transform_coefficients, operations.len());
        let degenerate = config.is_degenerate();

        let degree = config.degree as i64;
        tracing::debug!(
            degree,
            operations = operations.len(),
            coefficients = config.transform_coefficients.len(),
            "recurrence evaluator compiled"
        );
        if degenerate {
            tracing::warn!(
                min_bound = config.min_bound,
                max_bound = config.max_bound,
                "empty output range, every value collapses to min_bound"
            );
        }

        Ok(Self {
            degree,
            seeds: config.seeds.clone(),
            operations,
            coefficients,
            min_bound: config.min_bound,
            range: config.max_bound as f64 - config.min_bound as f64,
            degenerate,
            cache: HashMap::new(),
        })
    }

    /// Bounded value of `f(x)`, or `None` if `x` is poisoned.
    ///
    /// Negative indices clamp to `0`. With a degenerate range every other
    /// index yields `min_bound`.
    pub fn evaluate(&mut self, x: i64) -> Option<i64> {
        if x < 0 {
            return Some(0);
        }
        if self.degenerate {
            return Some(self.min_bound);
        }
        if let Some(&cached) = self.cache.get(&x) {
            return cached;
        }

        let mut pending = Vec::new();
        let mut index = x;
        let mut value = loop {
            if let Some(&cached) = self.cache.get(&index) {
                break cached;
            }
            if index < self.degree {
                let seeded = self.bound(self.seeds[index as usize]);
                self.cache.insert(index, seeded);
                break seeded;
            }
            pending.push(index);
            index -= self.degree;
        };

        while let Some(index) = pending.pop() {
            let operation = &self.operations[self.operation_index(index)];
            value = value.and_then(|previous| self.bound(operation.apply(previous as f64)));
            self.cache.insert(index, value);
        }

        value
    }

    /// Number of memoized indices.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// True if every evaluation collapses to `min_bound`.
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// `sel(x)` for `x >= degree`.
    fn operation_index(&self, index: i64) -> usize {
        let steps = i128::from(index - self.degree);
        let selector = steps + self.coefficients.sum_mod(steps);
        selector.rem_euclid(self.coefficients.modulus) as usize
    }

    /// Floor, then fold into `[min, max)` with a non-negative modulo.
    ///
    /// Both modulo steps run in `f64` so huge raw values lose precision the
    /// same way existing ciphertexts did. Non-finite input is poisoned.
    fn bound(&self, raw: f64) -> Option<i64> {
        if !raw.is_finite() {
            return None;
        }
        let min = self.min_bound as f64;
        let shifted = (raw.floor() - min) % self.range;
        let wrapped = (shifted + self.range) % self.range;
        Some((min + wrapped) as i64)
    }
}

/// Prefix sums of the transform coefficients, reduced modulo the operation
/// count.
///
/// Only `ntc(x) mod |ops|` is ever observed, so reducing every term keeps the
/// arithmetic exact without overflow, and turns the O(x) summation into
/// O(1).
#[derive(Debug)]
struct CoefficientTable {
    /// `prefix[k]` = sum of the first `k` coefficients, mod `modulus`
    prefix: Vec<i128>,
    /// Sum of one full cycle, mod `modulus`
    period_sum: i128,
    modulus: i128,
}

impl CoefficientTable {
    fn new(coefficients: &[i64], operations: usize) -> Self {
        let modulus = operations as i128;
        let mut prefix = Vec::with_capacity(coefficients.len() + 1);
        let mut running = 0i128;
        prefix.push(running);
        for &coefficient in coefficients {
            running = (running + i128::from(coefficient)).rem_euclid(modulus);
            prefix.push(running);
        }

        Self { prefix, period_sum: running, modulus }
    }

    /// Sum of `TC[v mod n]` for `v` in `0..steps`, mod `modulus`.
    fn sum_mod(&self, steps: i128) -> i128 {
        let period = (self.prefix.len() - 1) as i128;
        let cycles = (steps / period).rem_euclid(self.modulus);
        let tail = self.prefix[(steps % period) as usize];
        (cycles * self.period_sum + tail).rem_euclid(self.modulus)
    }
}
