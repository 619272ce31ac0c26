//! Fixed scenarios for the keystream engine
//!
//! Hand-computed keystreams and error messages. Any change here means
//! existing ciphertexts or key files no longer behave the same.

use insta::assert_snapshot;
use nasm_engine::{
    CipherConfig, ConfigError, EngineError, OperationSpec, RecurrenceEvaluator, decrypt, encrypt,
    keystream_bytes, transform,
};

fn scenario() -> CipherConfig {
    CipherConfig::from_json(
        r#"{
            "name": "scenario",
            "degree": 2,
            "seeds": [5, 7],
            "operations": [["a", "+3"]],
            "transformCoefficients": [1],
            "minBound": 0,
            "maxBound": 10
        }"#,
    )
    .unwrap()
}

#[test]
fn recurrence_first_values() {
    let mut evaluator = RecurrenceEvaluator::new(&scenario()).unwrap();

    assert_eq!(evaluator.evaluate(0), Some(5));
    assert_eq!(evaluator.evaluate(1), Some(7));
    assert_eq!(evaluator.evaluate(2), Some(8));
}

#[test]
fn degenerate_config_always_min_bound() {
    let mut config = scenario();
    config.min_bound = 5;
    config.max_bound = 5;

    let mut evaluator = RecurrenceEvaluator::new(&config).unwrap();
    for x in 0..100 {
        assert_eq!(evaluator.evaluate(x), Some(5));
    }

    // Every keystream byte is 5, whatever the intensity
    assert_eq!(keystream_bytes(&config, 6, 13).unwrap(), vec![5; 6]);
}

#[test]
fn keystream_snapshots() {
    assert_snapshot!(format!("{:?}", keystream_bytes(&scenario(), 8, 1).unwrap()), @"[5, 7, 8, 0, 1, 3, 4, 6]");
    assert_snapshot!(format!("{:?}", keystream_bytes(&scenario(), 4, 2).unwrap()), @"[9, 2, 3, 1]");
}

#[test]
fn mixed_operations_reference_keystream() {
    let config = CipherConfig::from_json(
        r#"{
            "name": "reference",
            "d": 3,
            "starts": [3, 11, 6.5],
            "I": [["a", "+7"], ["b", "*3"], ["c", "-2"], ["d", "/3"]],
            "TC": [2, 5, 1],
            "minBound": -4,
            "maxBound": 29
        }"#,
    )
    .unwrap();

    assert_eq!(
        keystream_bytes(&config, 20, 3).unwrap(),
        vec![3, 18, 3, 1, 3, 3, 3, 18, 18, 18, 3, 1, 3, 1, 3, 1, 3, 3, 3, 18]
    );
}

#[test]
fn division_by_zero_passes_bytes_through() {
    let config = CipherConfig::from_json(
        r#"{"name":"poisoned","d":1,"starts":[5],"I":[["a","/0"]],"TC":[1],
            "minBound":3,"maxBound":10}"#,
    )
    .unwrap();

    // Only f(0) = 5 has a value; every later index divides by zero
    assert_eq!(encrypt(&[0x41; 4], &config, 1).unwrap(), vec![68, 65, 65, 65]);
    assert_eq!(decrypt(&[68, 65, 65, 65], &config).unwrap(), vec![0x41; 4]);
}

#[test]
fn legacy_key_record_matches_canonical() {
    let legacy = CipherConfig::from_json(
        r#"{"name":"scenario","d":"2","starts":["5","7"],"I":[["a","+3"]],
            "TC":["1"],"minBound":"0","maxBound":"10"}"#,
    )
    .unwrap();

    assert_eq!(legacy, scenario());
    assert_eq!(
        keystream_bytes(&legacy, 256, 3).unwrap(),
        keystream_bytes(&scenario(), 256, 3).unwrap()
    );
}

#[test]
fn encrypt_then_decrypt_at_intensity_one() {
    let plaintext = b"Meeting notes, frame 3".to_vec();
    let ciphertext = encrypt(&plaintext, &scenario(), 1).unwrap();
    assert_eq!(decrypt(&ciphertext, &scenario()).unwrap(), plaintext);
}

#[test]
fn decrypt_ignores_encryption_intensity() {
    let plaintext = vec![0u8; 64];
    let ciphertext = encrypt(&plaintext, &scenario(), 10).unwrap();

    assert_ne!(decrypt(&ciphertext, &scenario()).unwrap(), plaintext);
    assert_eq!(transform(&ciphertext, &scenario(), 10, |_| {}).unwrap(), plaintext);
}

#[test]
fn config_error_messages() {
    let mut config = scenario();

    config.operations = vec![OperationSpec::new("a", "%3")];
    assert_snapshot!(config.validate().unwrap_err(), @"operation 0: unsupported operator '%'");

    config.operations = vec![OperationSpec::new("a", "+3"), OperationSpec::new("b", "*x")];
    assert_snapshot!(config.validate().unwrap_err(), @r#"operation 1: invalid operand in "*x""#);

    config.operations.clear();
    assert_snapshot!(config.validate().unwrap_err(), @"operation list is empty");
}

#[test]
fn config_error_aborts_transform() {
    let mut config = scenario();
    config.transform_coefficients.clear();

    let result = encrypt(b"never written", &config, 1);
    assert_eq!(result, Err(EngineError::Config(ConfigError::EmptyTransformCoefficients)));
}

#[test]
fn malformed_json_is_a_config_error() {
    let result = CipherConfig::from_json("{ not json");
    assert!(matches!(result, Err(ConfigError::Malformed { .. })));
}
