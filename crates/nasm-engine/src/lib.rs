//! NASM keystream engine
//!
//! A configuration-driven byte scrambler. A key config defines a bounded
//! integer recurrence; the recurrence, driven through a number of feedback
//! rounds (the intensity), yields one keystream byte per input byte, and the
//! input is XORed against it. Pure functions over byte buffers, no I/O.
//!
//! This is not a cryptographically secure cipher. It is a deterministic,
//! reversible, key-parameterized transform whose numeric behavior is fixed
//! by the ciphertexts already produced with it.
//!
//! # Pipeline
//!
//! ```text
//! CipherConfig
//!        │
//!        ▼ compile (fails early on bad operations)
//! RecurrenceEvaluator  f(x), memoized per transform
//!        │
//!        ▼ intensity feedback rounds per position
//! Keystream            lazy, one byte per input byte
//!        │
//!        ▼ XOR
//! Output buffer        same length as input
//! ```
//!
//! Each transform builds its own evaluator and drops it on return. Memo
//! tables are keyed by index alone and are never shared between configs or
//! calls, so concurrent transforms need no synchronization.
//!
//! # Direction
//!
//! [`encrypt`] takes a caller-chosen intensity; [`decrypt`] always uses
//! [`DECRYPT_INTENSITY`]. Data encrypted at any other intensity only comes
//! back through [`transform`] with the original intensity.
//!
//! The [`sealed`] module provides a second format that carries its own IV and
//! timestamp header.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod keystream;
pub mod sealed;

pub use cipher::{
    CancelFlag, DECRYPT_INTENSITY, PROGRESS_INTERVAL, decrypt, encrypt, transform,
    transform_cancellable,
};
pub use config::{CipherConfig, Operation, OperationSpec, Operator};
pub use error::{ConfigError, EngineError};
pub use evaluator::RecurrenceEvaluator;
pub use keystream::{Keystream, keystream_bytes};
pub use sealed::{HEADER_SIZE, SealHeader, SealedStream, open, seal};
