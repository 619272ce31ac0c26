//! Headered keystream format
//!
//! A second, self-describing format. Each sealed buffer carries the IV and
//! timestamp its keystream was salted with, so opening needs only the key
//! config and the intensity.
//!
//! ```text
//! [0..16)   IV
//! [16..24)  timestamp, i64 little-endian (ms since the Unix epoch)
//! [24..)    data XOR keystream
//! ```
//!
//! The generator is a ring of 32-bit cells seeded from the config, salted
//! with IV and timestamp, and stepped with wrapping 32-bit arithmetic, a
//! substitution box, a rotation and feedback from the previous cell.

use crate::{
    cipher::{CancelFlag, apply_keystream},
    config::{CipherConfig, Operator},
    error::{ConfigError, EngineError},
};

/// IV length
pub const IV_SIZE: usize = 16;

/// Timestamp length
pub const TIMESTAMP_SIZE: usize = 8;

/// Total header length
pub const HEADER_SIZE: usize = IV_SIZE + TIMESTAMP_SIZE;

/// Divisor splitting the timestamp into its high salt word
const TIMESTAMP_HIGH_DIVISOR: f64 = 4_294_967_295.0;

/// Non-linear substitution table.
const SUBSTITUTION_BOX: [u8; 256] = [
    99, 124, 119, 123, 242, 107, 111, 197, 48, 1, 103, 43, 254, 215, 171, 118, //
    202, 130, 201, 125, 250, 89, 71, 240, 173, 212, 162, 175, 156, 164, 114, 192, //
    183, 253, 147, 38, 54, 63, 247, 204, 52, 165, 229, 241, 113, 216, 49, 21, //
    4, 199, 35, 195, 24, 150, 5, 154, 7, 18, 128, 226, 235, 39, 178, 117, //
    9, 131, 44, 26, 27, 110, 90, 160, 82, 59, 214, 179, 41, 227, 47, 132, //
    83, 209, 0, 237, 32, 252, 177, 91, 106, 203, 190, 57, 74, 76, 88, 207, //
    208, 239, 170, 251, 67, 77, 51, 133, 69, 249, 2, 127, 80, 60, 159, 168, //
    81, 163, 64, 143, 146, 157, 56, 245, 188, 182, 218, 33, 16, 255, 243, 210, //
    205, 12, 19, 236, 95, 151, 68, 23, 196, 167, 126, 61, 100, 93, 25, 115, //
    96, 129, 79, 220, 34, 42, 144, 136, 70, 238, 184, 20, 222, 94, 11, 219, //
    224, 50, 58, 10, 73, 6, 36, 92, 194, 211, 172, 98, 145, 149, 228, 121, //
    231, 200, 55, 109, 141, 213, 78, 169, 108, 86, 244, 234, 101, 122, 174, 8, //
    186, 120, 37, 46, 28, 166, 180, 198, 232, 221, 116, 31, 75, 189, 139, 138, //
    112, 62, 181, 102, 72, 3, 246, 14, 97, 53, 87, 185, 134, 193, 29, 158, //
    225, 248, 152, 17, 105, 217, 142, 148, 155, 30, 135, 233, 206, 85, 40, 223, //
    140, 161, 137, 13, 191, 230, 66, 104, 65, 153, 45, 15, 176, 84, 187, 22, //
];

/// Salt stored at the front of every sealed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealHeader {
    /// Initialization vector
    pub iv: [u8; IV_SIZE],
    /// Milliseconds since the Unix epoch at sealing time
    pub timestamp: i64,
}

impl SealHeader {
    /// Header bytes.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..IV_SIZE].copy_from_slice(&self.iv);
        bytes[IV_SIZE..].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes
    }

    /// Read the header from the front of `bytes`.
    ///
    /// # Errors
    ///
    /// - `TruncatedHeader`: fewer than [`HEADER_SIZE`] bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, EngineError> {
        let truncated =
            || EngineError::TruncatedHeader { required: HEADER_SIZE, actual: bytes.len() };

        let (iv, rest) = bytes.split_first_chunk::<IV_SIZE>().ok_or_else(truncated)?;
        let (timestamp, _) = rest.split_first_chunk::<TIMESTAMP_SIZE>().ok_or_else(truncated)?;

        Ok(Self { iv: *iv, timestamp: i64::from_le_bytes(*timestamp) })
    }
}

/// One 32-bit ring operation.
#[derive(Debug, Clone, Copy)]
struct WordOperation {
    operator: Operator,
    operand: i32,
}

impl WordOperation {
    fn apply(self, value: i32) -> i32 {
        match self.operator {
            Operator::Add => value.wrapping_add(self.operand),
            Operator::Sub => value.wrapping_sub(self.operand),
            Operator::Mul => value.wrapping_mul(self.operand),
            // `/` is XOR in the ring
            Operator::Div => value ^ self.operand,
        }
    }
}

/// Stateful generator behind the sealed format.
#[derive(Debug)]
pub struct SealedStream {
    ring: Vec<i32>,
    head: i64,
    cycle: usize,
    degree: i64,
    operations: Vec<WordOperation>,
    coefficients: Vec<i64>,
    min_bound: i64,
    range: i32,
}

impl SealedStream {
    /// Seed the ring from `config` and salt it with `header`.
    ///
    /// # Errors
    ///
    /// - Any [`ConfigError`] from [`CipherConfig::compile_operations`]
    pub fn new(config: &CipherConfig, header: &SealHeader) -> Result<Self, ConfigError> {
        let operations = config
            .compile_operations()?
            .iter()
            .map(|op| WordOperation {
                operator: op.operator(),
                operand: to_int32(op.operand().floor()),
            })
            .collect();

        let low = header.timestamp as i32;
        let high = to_int32((header.timestamp as f64 / TIMESTAMP_HIGH_DIVISOR).floor());

        let ring = config
            .seeds
            .iter()
            .enumerate()
            .map(|(index, &seed)| {
                let mut cell = to_int32(seed);
                if let Some(&salt) = header.iv.get(index) {
                    cell ^= i32::from(salt);
                }
                cell ^ if index % 2 == 0 { low } else { high }
            })
            .collect::<Vec<_>>();

        let range = (i128::from(config.max_bound) - i128::from(config.min_bound)) as i32;
        tracing::debug!(cells = ring.len(), range, "sealed stream seeded");

        Ok(Self {
            head: ring.len() as i64,
            ring,
            cycle: 0,
            degree: config.degree as i64,
            operations,
            coefficients: config.transform_coefficients.clone(),
            min_bound: config.min_bound,
            range,
        })
    }

    /// Advance the ring one step and return the bounded value.
    ///
    /// A non-positive 32-bit range returns `min_bound` without advancing.
    pub fn step(&mut self) -> i64 {
        if self.range <= 0 {
            return self.min_bound;
        }

        let cells = self.ring.len() as i64;
        let mut value = self.ring[(self.head - self.degree).rem_euclid(cells) as usize];

        let coefficient = self.coefficients[self.cycle % self.coefficients.len()];
        self.cycle += 1;

        let selector = (i128::from(self.head) + i128::from(value) + i128::from(coefficient))
            .unsigned_abs()
            % self.operations.len() as u128;
        value = self.operations[selector as usize].apply(value);

        value ^= i32::from(SUBSTITUTION_BOX[(value.unsigned_abs() & 0xFF) as usize]);
        value = value.rotate_left(7);
        value ^= self.ring[(self.head - 1).rem_euclid(cells) as usize];

        let result = self
            .min_bound
            .saturating_add(i64::from(value.unsigned_abs()) % i64::from(self.range));
        self.ring[self.head.rem_euclid(cells) as usize] = result as i32;
        self.head += 1;

        result
    }

    /// Next keystream byte: the low byte of the last of `intensity` steps
    /// (at least one).
    pub fn next_byte(&mut self, intensity: u32) -> u8 {
        let mut value = 0;
        for _ in 0..intensity.max(1) {
            value = self.step();
        }
        (value & 0xFF) as u8
    }
}

/// Seal `source` into `header || data ^ keystream`.
///
/// The caller supplies the IV and timestamp; production callers must use
/// fresh random bytes.
pub fn seal(
    source: &[u8],
    config: &CipherConfig,
    intensity: u32,
    header: SealHeader,
    on_progress: impl FnMut(f64),
) -> Result<Vec<u8>, EngineError> {
    seal_with(source, config, intensity, header, on_progress, None)
}

/// [`seal`] that stops early once `cancel` is set.
pub fn seal_cancellable(
    source: &[u8],
    config: &CipherConfig,
    intensity: u32,
    header: SealHeader,
    on_progress: impl FnMut(f64),
    cancel: &CancelFlag,
) -> Result<Vec<u8>, EngineError> {
    seal_with(source, config, intensity, header, on_progress, Some(cancel))
}

/// Recover the data of a sealed buffer.
///
/// # Errors
///
/// - `TruncatedHeader`: input shorter than [`HEADER_SIZE`]
/// - `Config`: config rejected
pub fn open(
    sealed: &[u8],
    config: &CipherConfig,
    intensity: u32,
    on_progress: impl FnMut(f64),
) -> Result<Vec<u8>, EngineError> {
    open_with(sealed, config, intensity, on_progress, None)
}

/// [`open`] that stops early once `cancel` is set.
pub fn open_cancellable(
    sealed: &[u8],
    config: &CipherConfig,
    intensity: u32,
    on_progress: impl FnMut(f64),
    cancel: &CancelFlag,
) -> Result<Vec<u8>, EngineError> {
    open_with(sealed, config, intensity, on_progress, Some(cancel))
}

fn seal_with(
    source: &[u8],
    config: &CipherConfig,
    intensity: u32,
    header: SealHeader,
    on_progress: impl FnMut(f64),
    cancel: Option<&CancelFlag>,
) -> Result<Vec<u8>, EngineError> {
    let mut stream = SealedStream::new(config, &header)?;
    let keystream = (0..source.len()).map(|_| stream.next_byte(intensity));
    let body = apply_keystream(source, keystream, on_progress, cancel)?;

    let mut sealed = Vec::with_capacity(HEADER_SIZE + body.len());
    sealed.extend_from_slice(&header.encode());
    sealed.extend_from_slice(&body);
    Ok(sealed)
}

fn open_with(
    sealed: &[u8],
    config: &CipherConfig,
    intensity: u32,
    on_progress: impl FnMut(f64),
    cancel: Option<&CancelFlag>,
) -> Result<Vec<u8>, EngineError> {
    let header = SealHeader::decode(sealed)?;
    let body = &sealed[HEADER_SIZE..];

    let mut stream = SealedStream::new(config, &header)?;
    let keystream = (0..body.len()).map(|_| stream.next_byte(intensity));
    apply_keystream(body, keystream, on_progress, cancel)
}

/// Wrap to a signed 32-bit integer, truncating any fraction first.
/// Non-finite values map to zero.
fn to_int32(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().rem_euclid(4_294_967_296.0) as u32 as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperationSpec;

    fn config() -> CipherConfig {
        CipherConfig {
            name: "sealed".to_string(),
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
        }
    }

    fn header() -> SealHeader {
        SealHeader { iv: [0x5A; IV_SIZE], timestamp: 1_700_000_000_123 }
    }

    #[test]
    fn to_int32_wraps_like_32_bit_registers() {
        assert_eq!(to_int32(5.9), 5);
        assert_eq!(to_int32(-5.9), -5);
        assert_eq!(to_int32(4_294_967_296.0), 0);
        assert_eq!(to_int32(2_147_483_648.0), i32::MIN);
        assert_eq!(to_int32(-2_147_483_649.0), i32::MAX);
        assert_eq!(to_int32(f64::NAN), 0);
    }

    #[test]
    fn header_layout() {
        let bytes = SealHeader { iv: [7; IV_SIZE], timestamp: 0x0102_0304_0506_0708 }.encode();

        assert_eq!(&bytes[..IV_SIZE], &[7; IV_SIZE]);
        assert_eq!(&bytes[IV_SIZE..], &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(SealHeader::decode(&bytes).unwrap().timestamp, 0x0102_0304_0506_0708);
    }

    #[test]
    fn seal_open_roundtrip() {
        let plaintext: Vec<u8> = (0..9000u32).map(|i| (i % 251) as u8).collect();

        let sealed = seal(&plaintext, &config(), 4, header(), |_| {}).unwrap();
        assert_eq!(sealed.len(), plaintext.len() + HEADER_SIZE);
        assert_eq!(SealHeader::decode(&sealed).unwrap(), header());

        let opened = open(&sealed, &config(), 4, |_| {}).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn reference_keystream() {
        let sealed = seal(&[0u8; 16], &config(), 4, header(), |_| {}).unwrap();
        assert_eq!(
            &sealed[HEADER_SIZE..],
            &[78, 36, 116, 54, 92, 122, 78, 98, 74, 108, 54, 110, 66, 80, 72, 76]
        );
    }

    #[test]
    fn keystream_depends_on_iv_and_timestamp() {
        let plaintext = vec![0u8; 64];
        let base = seal(&plaintext, &config(), 1, header(), |_| {}).unwrap();

        let mut other_iv = header();
        other_iv.iv = [0x5B; IV_SIZE];
        let with_iv = seal(&plaintext, &config(), 1, other_iv, |_| {}).unwrap();

        let mut other_time = header();
        other_time.timestamp += 10_000_000_000_001;
        let with_time = seal(&plaintext, &config(), 1, other_time, |_| {}).unwrap();

        assert_ne!(base[HEADER_SIZE..], with_iv[HEADER_SIZE..]);
        assert_ne!(base[HEADER_SIZE..], with_time[HEADER_SIZE..]);
    }

    #[test]
    fn deterministic_for_fixed_header() {
        let plaintext = b"the same bytes twice".to_vec();
        let first = seal(&plaintext, &config(), 3, header(), |_| {}).unwrap();
        let second = seal(&plaintext, &config(), 3, header(), |_| {}).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn values_stay_in_bounds() {
        let mut stream = SealedStream::new(&config(), &header()).unwrap();
        for _ in 0..5000 {
            let value = stream.step();
            assert!((32..126).contains(&value), "{value}");
        }
    }

    #[test]
    fn degenerate_range_masks_with_min_bound() {
        let mut config = config();
        config.min_bound = 0x41;
        config.max_bound = 0x41;

        let sealed = seal(&[0x00, 0x41, 0xFF], &config, 9, header(), |_| {}).unwrap();
        assert_eq!(&sealed[HEADER_SIZE..], &[0x41, 0x00, 0xBE]);
    }

    #[test]
    fn open_rejects_truncated_input() {
        let result = open(&[0u8; HEADER_SIZE - 1], &config(), 1, |_| {});
        assert_eq!(
            result,
            Err(EngineError::TruncatedHeader { required: HEADER_SIZE, actual: HEADER_SIZE - 1 })
        );
    }

    #[test]
    fn open_header_only_is_empty() {
        let mut reports = Vec::new();
        let opened = open(&header().encode(), &config(), 1, |p| reports.push(p)).unwrap();
        assert!(opened.is_empty());
        assert_eq!(reports, vec![0.0, 1.0]);
    }

    #[test]
    fn zero_intensity_runs_one_step() {
        let plaintext = vec![0u8; 16];
        let zero = seal(&plaintext, &config(), 0, header(), |_| {}).unwrap();
        let one = seal(&plaintext, &config(), 1, header(), |_| {}).unwrap();
        assert_eq!(zero, one);
    }

    #[test]
    fn cancellation_returns_no_output() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = seal_cancellable(&[1, 2, 3], &config(), 1, header(), |_| {}, &cancel);
        assert!(matches!(result, Err(EngineError::Cancelled { .. })));
    }
}
