//! # Certgen Core
//!
//! Settings, logging, time and filesystem utilities for the certgen
//! credential bootstrapper.
//!
//! This crate provides:
//!
//! - **Settings**: layered YAML/environment configuration for a run
//! - **Logging**: `tracing-subscriber` setup from a [`LogConfig`]
//! - **Time**: second-precision timestamps and calendar-year arithmetic
//! - **Filesystems**: local-disk and in-memory implementations of
//!   [`certgen_types::Filesystem`]
//!
//! ## Example
//!
//! ```no_run
//! use certgen_core::{config::Settings, fs::LocalFilesystem, log};
//!
//! let settings = Settings::load("certgen.yml")?;
//! log::init(&settings.log)?;
//! let fs = LocalFilesystem::new(settings.output_dir())?;
//! # Ok::<(), certgen_types::CertgenError>(())
//! ```
//!
//! [`LogConfig`]: certgen_types::config::LogConfig

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod fs;
pub mod log;
pub mod time;

// Re-export commonly used items
pub use config::{MasterSettings, Settings};
pub use fs::{LocalFilesystem, MemoryFilesystem};
pub use certgen_types::{CertgenError, Result};

/// Certgen version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Certgen application name
pub const APP_NAME: &str = "certgen";
