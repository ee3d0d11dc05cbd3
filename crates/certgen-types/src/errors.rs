//! Error types for certgen operations.

use thiserror::Error;

/// The main error type for certgen operations.
///
/// Every failure in a bootstrap run is fatal: nothing is retried and no
/// partially-issued credential set is handed back to the caller.
#[derive(Error, Debug)]
pub enum CertgenError {
    /// Key generation, DER encoding, or certificate build/parse failure
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// A certificate was requested from a CA that is not in the registry
    #[error("Unknown signer: {0}")]
    UnknownSigner(String),

    /// A credential needed by a later phase has not been prepared yet
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Configuration-related error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal bug - should never happen in production
    #[error("Bug detected: {0}\n\nThis is an internal error. Please report this issue at:\nhttps://github.com/certgen-community/certgen-rs/issues")]
    Bug(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// A specialized Result type for certgen operations.
pub type Result<T> = std::result::Result<T, CertgenError>;

/// Helper macro to create and return a CertgenError::Bug
///
/// This should be used for conditions that should never occur
/// in normal operation.
///
/// # Example
///
/// ```ignore
/// if some_impossible_condition {
///     bug!("This should never happen: {:?}", condition);
/// }
/// ```
#[macro_export]
macro_rules! bug {
    ($msg:expr) => {
        return Err($crate::CertgenError::Bug($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::CertgenError::Bug(format!($fmt, $($arg)*)))
    };
}

/// Helper macro to bail out with a CertgenError
///
/// # Example
///
/// ```ignore
/// if ips.is_empty() {
///     bail!(Config, "master {} has no addresses", hostname);
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($variant:ident, $msg:expr) => {
        return Err($crate::CertgenError::$variant($msg.to_string()))
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::CertgenError::$variant(format!($fmt, $($arg)*)))
    };
    ($msg:expr) => {
        return Err($crate::CertgenError::Other($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::CertgenError::Other(format!($fmt, $($arg)*)))
    };
}
