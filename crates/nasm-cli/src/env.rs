//! Environment abstraction for deterministic testing.
//!
//! Sealing draws a fresh IV and timestamp for every file. Routing both through
//! [`Environment`] lets tests pin them and compare sealed output byte for byte.

use nasm_engine::{SealHeader, sealed::IV_SIZE};

/// Source of randomness and wall-clock time.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Uses cryptographically secure entropy in production
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Milliseconds since the Unix epoch.
    fn wall_clock_millis(&self) -> i64;

    /// Fresh header for a sealed file.
    fn seal_header(&self) -> SealHeader {
        let mut iv = [0u8; IV_SIZE];
        self.random_bytes(&mut iv);
        SealHeader { iv, timestamp: self.wall_clock_millis() }
    }
}

/// Production environment using the OS RNG and the system clock.
///
/// # Panics
///
/// Panics if the OS RNG fails. Sealing with a predictable IV is worse than
/// not sealing at all.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }

    fn wall_clock_millis(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
    }
}
