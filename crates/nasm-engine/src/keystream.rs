//! Lazy keystream over a recurrence evaluator

use crate::{config::CipherConfig, error::ConfigError, evaluator::RecurrenceEvaluator};

/// Finite, single-pass byte stream.
///
/// Byte `i` is the result of `intensity` feedback rounds starting from `i`,
/// where round `j` evaluates `f(previous + j * length)`. All rounds share the
/// borrowed evaluator, so later positions reuse earlier memoized indices.
///
/// A poisoned value stays poisoned through the remaining rounds, whether it
/// is fed back as an index or not, and yields the byte `0`: the input byte
/// passes through unchanged.
///
/// Not restartable: a second pass needs a fresh evaluator.
pub struct Keystream<'a> {
    evaluator: &'a mut RecurrenceEvaluator,
    length: usize,
    stride: i64,
    intensity: u32,
    position: usize,
}

impl RecurrenceEvaluator {
    /// Keystream of exactly `length` bytes.
    ///
    /// An `intensity` of zero runs no rounds at all, so every byte is its own
    /// position modulo 256.
    pub fn keystream(&mut self, length: usize, intensity: u32) -> Keystream<'_> {
        Keystream {
            evaluator: self,
            length,
            stride: i64::try_from(length).unwrap_or(i64::MAX),
            intensity,
            position: 0,
        }
    }
}

impl Keystream<'_> {
    /// Feedback rounds per byte.
    pub fn intensity(&self) -> u32 {
        self.intensity
    }
}

impl Iterator for Keystream<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.position >= self.length {
            return None;
        }

        let mut value = Some(self.position as i64);
        for round in 0..self.intensity {
            let Some(previous) = value else {
                break;
            };
            let offset = i64::from(round).saturating_mul(self.stride);
            value = self.evaluator.evaluate(previous.saturating_add(offset));
        }
        self.position += 1;

        Some(value.map_or(0, |value| value.rem_euclid(256) as u8))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.length - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Keystream<'_> {}

/// Materialize a whole keystream with a fresh evaluator.
///
/// Useful for diagnostics and tests; transforms consume the stream lazily
/// instead.
pub fn keystream_bytes(
    config: &CipherConfig,
    length: usize,
    intensity: u32,
) -> Result<Vec<u8>, ConfigError> {
    let mut evaluator = RecurrenceEvaluator::new(config)?;
    Ok(evaluator.keystream(length, intensity).collect())
}
