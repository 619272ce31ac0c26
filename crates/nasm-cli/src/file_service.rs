//! Whole-file transforms.
//!
//! Each job reads its input into memory, runs the engine on the blocking
//! pool, and writes the result through a `.partial` sibling that is renamed
//! into place only on success. A failed or cancelled job leaves no output.
//!
//! Progress and user-facing notices go out as [`FileEvent`]s on an unbounded
//! channel, so the CPU-bound transform never waits on the consumer.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use nasm_engine::{
    CancelFlag, CipherConfig, DECRYPT_INTENSITY,
    sealed::{open_cancellable, seal_cancellable},
    transform_cancellable,
};
use tokio::{fs, sync::mpsc::UnboundedSender};

use crate::{env::Environment, error::FileServiceError};

/// Extension appended to encrypted and sealed files.
pub const ENCRYPTED_EXTENSION: &str = "nasm";

/// Suffix for decrypted files whose name has no [`ENCRYPTED_EXTENSION`].
pub const DECRYPTED_SUFFIX: &str = ".decrypted";

const PARTIAL_SUFFIX: &str = ".partial";

/// Event emitted while a job runs.
#[derive(Debug, Clone, PartialEq)]
pub enum FileEvent {
    /// Fraction of the input processed, in `[0, 1]`.
    Progress(f64),
    /// Human-readable status message.
    Notice {
        /// Short heading (`Encryption`, `Success`, `Error`, ...)
        title: String,
        /// Message text
        body: String,
    },
}

/// Collapses a progress stream into whole-decile steps.
///
/// Useful for log output, where one line per progress boundary is noise.
#[derive(Debug, Default)]
pub struct ProgressDeciles {
    last: Option<u32>,
}

impl ProgressDeciles {
    /// Percentage to report for `fraction`, if it starts a new decile.
    pub fn observe(&mut self, fraction: f64) -> Option<u32> {
        let decile = (fraction.clamp(0.0, 1.0) * 10.0).floor() as u32;
        if self.last.is_some_and(|last| decile <= last) {
            return None;
        }
        self.last = Some(decile);
        Some(decile * 10)
    }
}

/// Kind of transform a job applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileJob {
    /// XOR with the keystream at a chosen intensity
    Encrypt {
        /// Feedback rounds per byte
        intensity: u32,
    },
    /// XOR with the keystream at [`DECRYPT_INTENSITY`]
    Decrypt,
    /// Headered format with a fresh IV and timestamp
    Seal {
        /// Steps per byte
        intensity: u32,
    },
    /// Reverse of [`FileJob::Seal`]
    Open {
        /// Steps per byte; must match the sealing intensity
        intensity: u32,
    },
}

impl FileJob {
    /// Notice title for the running job.
    pub fn title(self) -> &'static str {
        match self {
            Self::Encrypt { .. } => "Encryption",
            Self::Decrypt => "Decryption",
            Self::Seal { .. } => "Sealing",
            Self::Open { .. } => "Opening",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Self::Encrypt { .. } => "encrypted",
            Self::Decrypt => "decrypted",
            Self::Seal { .. } => "sealed",
            Self::Open { .. } => "opened",
        }
    }

    /// Output path used when the caller does not name one.
    pub fn default_output(self, input: &Path) -> PathBuf {
        match self {
            Self::Encrypt { .. } | Self::Seal { .. } => encrypted_name(input),
            Self::Decrypt | Self::Open { .. } => decrypted_name(input),
        }
    }
}

/// `<input>.nasm`
pub fn encrypted_name(input: &Path) -> PathBuf {
    with_suffix(input, &format!(".{ENCRYPTED_EXTENSION}"))
}

/// `input` without its `.nasm` extension, or `<input>.decrypted`.
pub fn decrypted_name(input: &Path) -> PathBuf {
    if input.extension().is_some_and(|ext| ext == ENCRYPTED_EXTENSION) {
        input.with_extension("")
    } else {
        with_suffix(input, DECRYPTED_SUFFIX)
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Runs file jobs and reports their progress.
///
/// All jobs started from one service share its cancel flag. Cancelling stops
/// the running job at its next progress boundary; the flag stays set until
/// [`FileService::reset_cancel`] is called.
#[derive(Debug, Clone)]
pub struct FileService<E: Environment> {
    env: E,
    events: UnboundedSender<FileEvent>,
    cancel: CancelFlag,
}

impl<E: Environment> FileService<E> {
    /// Create a service that reports to `events`.
    pub fn new(env: E, events: UnboundedSender<FileEvent>) -> Self {
        Self { env, events, cancel: CancelFlag::new() }
    }

    /// Handle that cancels running jobs.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Clear a previous cancellation so new jobs can run.
    pub fn reset_cancel(&mut self) {
        self.cancel = CancelFlag::new();
    }

    /// Encrypt `input` at `intensity`. Returns the path written.
    pub async fn encrypt_file(
        &self,
        input: &Path,
        output: Option<&Path>,
        config: &CipherConfig,
        intensity: u32,
    ) -> Result<PathBuf, FileServiceError> {
        self.run(FileJob::Encrypt { intensity }, input, output, config).await
    }

    /// Decrypt `input` at [`DECRYPT_INTENSITY`]. Returns the path written.
    pub async fn decrypt_file(
        &self,
        input: &Path,
        output: Option<&Path>,
        config: &CipherConfig,
    ) -> Result<PathBuf, FileServiceError> {
        self.run(FileJob::Decrypt, input, output, config).await
    }

    /// Seal `input` with a fresh header from the environment.
    pub async fn seal_file(
        &self,
        input: &Path,
        output: Option<&Path>,
        config: &CipherConfig,
        intensity: u32,
    ) -> Result<PathBuf, FileServiceError> {
        self.run(FileJob::Seal { intensity }, input, output, config).await
    }

    /// Open a sealed `input`.
    pub async fn open_file(
        &self,
        input: &Path,
        output: Option<&Path>,
        config: &CipherConfig,
        intensity: u32,
    ) -> Result<PathBuf, FileServiceError> {
        self.run(FileJob::Open { intensity }, input, output, config).await
    }

    /// Run `job`, reporting the outcome as a notice.
    pub async fn run(
        &self,
        job: FileJob,
        input: &Path,
        output: Option<&Path>,
        config: &CipherConfig,
    ) -> Result<PathBuf, FileServiceError> {
        let output = output.map_or_else(|| job.default_output(input), Path::to_path_buf);
        tracing::info!(
            job = job.title(),
            input = %input.display(),
            output = %output.display(),
            "job started"
        );

        let result = self.execute(job, input, &output, config).await;
        match &result {
            Ok(path) => {
                tracing::info!(job = job.title(), output = %path.display(), "job finished");
                self.notify(
                    "Success",
                    format!("File successfully {} to {}", job.past_tense(), file_name(path)),
                );
            },
            Err(err) if err.is_cancelled() => {
                tracing::warn!(job = job.title(), %err, "job cancelled");
                self.notify("Cancelled", format!("{} was cancelled.", job.title()));
            },
            Err(err) => {
                tracing::error!(job = job.title(), input = %input.display(), %err, "job failed");
                self.notify("Error", format!("{} failed: {err}", job.title()));
            },
        }
        result
    }

    async fn execute(
        &self,
        job: FileJob,
        input: &Path,
        output: &Path,
        config: &CipherConfig,
    ) -> Result<PathBuf, FileServiceError> {
        self.notify(job.title(), format!("Reading file {}...", file_name(input)));
        let source = fs::read(input)
            .await
            .map_err(|source| FileServiceError::Io { path: input.to_path_buf(), source })?;

        self.notify(job.title(), format!("Processing {} bytes...", source.len()));
        let bytes = self.transform(job, source, config.clone()).await?;

        write_atomically(output, &bytes).await?;
        Ok(output.to_path_buf())
    }

    async fn transform(
        &self,
        job: FileJob,
        source: Vec<u8>,
        config: CipherConfig,
    ) -> Result<Vec<u8>, FileServiceError> {
        let env = self.env.clone();
        let events = self.events.clone();
        let cancel = self.cancel.clone();

        let task = tokio::task::spawn_blocking(move || {
            let progress = move |fraction| {
                // Receiver gone means nobody is watching; keep going
                let _ = events.send(FileEvent::Progress(fraction));
            };

            match job {
                FileJob::Encrypt { intensity } => {
                    transform_cancellable(&source, &config, intensity, progress, &cancel)
                },
                FileJob::Decrypt => {
                    transform_cancellable(&source, &config, DECRYPT_INTENSITY, progress, &cancel)
                },
                FileJob::Seal { intensity } => {
                    let header = env.seal_header();
                    tracing::debug!(timestamp = header.timestamp, "sealing with fresh header");
                    seal_cancellable(&source, &config, intensity, header, progress, &cancel)
                },
                FileJob::Open { intensity } => {
                    open_cancellable(&source, &config, intensity, progress, &cancel)
                },
            }
        });

        let bytes = task
            .await
            .map_err(|err| FileServiceError::Task { reason: err.to_string() })??;
        Ok(bytes)
    }

    fn notify(&self, title: &str, body: String) {
        let _ = self.events.send(FileEvent::Notice { title: title.to_string(), body });
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Write `bytes` to a `.partial` sibling of `path`, then rename it over
/// `path`. The partial file is removed on any failure.
async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), FileServiceError> {
    let partial = with_suffix(path, PARTIAL_SUFFIX);

    let written = match fs::write(&partial, bytes).await {
        Ok(()) => fs::rename(&partial, path)
            .await
            .map_err(|source| FileServiceError::Io { path: path.to_path_buf(), source }),
        Err(source) => Err(FileServiceError::Io { path: partial.clone(), source }),
    };

    if written.is_err() {
        let _ = fs::remove_file(&partial).await;
    }
    written
}
