//! Key files on disk.
//!
//! A key file is the JSON form of a [`CipherConfig`]. Files written by older
//! key managers (short field names, numbers stored as strings) load as well.

use std::path::Path;

use nasm_engine::CipherConfig;
use tokio::fs;

use crate::error::KeyStoreError;

/// Load and validate the key at `path`.
///
/// A broken key fails here, before any input file is read.
pub async fn load_key(path: impl AsRef<Path>) -> Result<CipherConfig, KeyStoreError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .await
        .map_err(|source| KeyStoreError::Io { path: path.to_path_buf(), source })?;

    let config = CipherConfig::from_json(&json)
        .map_err(|source| KeyStoreError::Invalid { path: path.to_path_buf(), source })?;

    tracing::debug!(
        path = %path.display(),
        name = %config.name,
        degree = config.degree,
        operations = config.operations.len(),
        "key loaded"
    );
    Ok(config)
}

/// Write `config` to `path` in canonical form.
pub async fn save_key(path: impl AsRef<Path>, config: &CipherConfig) -> Result<(), KeyStoreError> {
    let path = path.as_ref();
    let json = config
        .to_json_pretty()
        .map_err(|source| KeyStoreError::Invalid { path: path.to_path_buf(), source })?;

    fs::write(path, json)
        .await
        .map_err(|source| KeyStoreError::Io { path: path.to_path_buf(), source })?;

    tracing::debug!(path = %path.display(), name = %config.name, "key saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use nasm_engine::{ConfigError, OperationSpec};
    use tempfile::tempdir;

    use super::*;

    fn key() -> CipherConfig {
        CipherConfig {
            name: "alpha".to_string(),
            degree: 2,
            seeds: vec![5.0, 7.0],
            operations: vec![OperationSpec::new("a", "+3")],
            transform_coefficients: vec![1],
            min_bound: 0,
            max_bound: 10,
        }
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alpha.json");

        save_key(&path, &key()).await.unwrap();
        assert_eq!(load_key(&path).await.unwrap(), key());
    }

    #[tokio::test]
    async fn loads_legacy_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(
            &path,
            r#"{"id":7,"name":"alpha","d":"2","starts":["5","7"],"I":[["a","+3"]],
                "TC":["1"],"minBound":"0","maxBound":"10"}"#,
        )
        .unwrap();

        assert_eq!(load_key(&path).await.unwrap(), key());
    }

    #[tokio::test]
    async fn rejects_invalid_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        let mut broken = key();
        broken.operations = vec![OperationSpec::new("a", "^3")];
        save_key(&path, &broken).await.unwrap();

        let err = load_key(&path).await.unwrap_err();
        assert!(matches!(
            err,
            KeyStoreError::Invalid {
                source: ConfigError::UnsupportedOperator { index: 0, operator: '^' },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = load_key(dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, KeyStoreError::Io { .. }));
    }
}
