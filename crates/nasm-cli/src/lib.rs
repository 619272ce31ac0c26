//! File front end for the nasm keystream engine.
//!
//! Wraps [`nasm_engine`]'s pure buffer transforms with the I/O around them:
//! key files on disk, whole-file jobs with progress events, and the
//! randomness and clock sealed files need.
//!
//! # Components
//!
//! - [`key_store`]: JSON key files, including legacy records
//! - [`FileService`]: encrypt, decrypt, seal and open files with progress
//! - [`Environment`]: randomness and wall clock ([`SystemEnv`] in production)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod file_service;
pub mod key_store;

pub use env::{Environment, SystemEnv};
pub use error::{FileServiceError, KeyStoreError};
pub use file_service::{FileEvent, FileJob, FileService, ProgressDeciles};
pub use key_store::{load_key, save_key};
