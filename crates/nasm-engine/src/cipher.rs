//! XOR buffer cipher with progress reporting
//!
//! The same transform serves both directions: XOR against an identical
//! keystream is self-inverse. Callers pick the direction only through the
//! intensity they pass.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{config::CipherConfig, error::EngineError, evaluator::RecurrenceEvaluator};

/// Bytes between progress reports (and cancellation checks).
pub const PROGRESS_INTERVAL: usize = 4096;

/// Intensity [`decrypt`] always uses.
///
/// Ciphertext produced with any other intensity will not decrypt back to the
/// plaintext through [`decrypt`]; use [`transform`] with the encryption
/// intensity instead.
pub const DECRYPT_INTENSITY: u32 = 1;

/// Shared cancellation flag.
///
/// Clones observe the same flag. A running transform polls it once per
/// [`PROGRESS_INTERVAL`] and stops without producing output.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// New, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// XOR `source` against a fresh keystream for `config`.
///
/// `on_progress` receives `0.0` first, the processed fraction every
/// [`PROGRESS_INTERVAL`] bytes, and `1.0` last, including for empty input.
///
/// # Errors
///
/// - `Config`: config rejected before any byte was processed
pub fn transform(
    source: &[u8],
    config: &CipherConfig,
    intensity: u32,
    on_progress: impl FnMut(f64),
) -> Result<Vec<u8>, EngineError> {
    run(source, config, intensity, on_progress, None)
}

/// [`transform`] that stops early once `cancel` is set.
///
/// # Errors
///
/// - `Config`: config rejected before any byte was processed
/// - `Cancelled`: flag observed at a progress boundary; no output is returned
pub fn transform_cancellable(
    source: &[u8],
    config: &CipherConfig,
    intensity: u32,
    on_progress: impl FnMut(f64),
    cancel: &CancelFlag,
) -> Result<Vec<u8>, EngineError> {
    run(source, config, intensity, on_progress, Some(cancel))
}

/// Encrypt with a caller-chosen intensity.
pub fn encrypt(
    source: &[u8],
    config: &CipherConfig,
    intensity: u32,
) -> Result<Vec<u8>, EngineError> {
    transform(source, config, intensity, |_| {})
}

/// Decrypt with [`DECRYPT_INTENSITY`].
///
/// Only inverts [`encrypt`] when the ciphertext was produced at that same
/// intensity.
pub fn decrypt(source: &[u8], config: &CipherConfig) -> Result<Vec<u8>, EngineError> {
    transform(source, config, DECRYPT_INTENSITY, |_| {})
}

fn run(
    source: &[u8],
    config: &CipherConfig,
    intensity: u32,
    on_progress: impl FnMut(f64),
    cancel: Option<&CancelFlag>,
) -> Result<Vec<u8>, EngineError> {
    let mut evaluator = RecurrenceEvaluator::new(config)?;
    tracing::debug!(length = source.len(), intensity, "transform started");

    let output = apply_keystream(
        source,
        evaluator.keystream(source.len(), intensity),
        on_progress,
        cancel,
    )?;

    tracing::debug!(
        length = output.len(),
        memoized = evaluator.cached_len(),
        "transform finished"
    );
    Ok(output)
}

/// XOR `source` byte for byte against `keystream`.
///
/// The keystream must yield at least `source.len()` bytes.
pub(crate) fn apply_keystream(
    source: &[u8],
    keystream: impl Iterator<Item = u8>,
    mut on_progress: impl FnMut(f64),
    cancel: Option<&CancelFlag>,
) -> Result<Vec<u8>, EngineError> {
    let total = source.len();
    let mut output = Vec::with_capacity(total);

    on_progress(0.0);
    for (index, (byte, key)) in source.iter().zip(keystream).enumerate() {
        if index % PROGRESS_INTERVAL == 0 {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                tracing::debug!(processed = index, total, "transform cancelled");
                return Err(EngineError::Cancelled { processed: index, total });
            }
            if index > 0 {
                tracing::trace!(processed = index, total, "transform progress");
                on_progress(index as f64 / total as f64);
            }
        }
        output.push(byte ^ key);
    }
    on_progress(1.0);

    Ok(output)
}
