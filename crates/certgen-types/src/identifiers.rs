//! Type-safe identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::errors::{CertgenError, Result};

/// An API server endpoint, `host:port`.
///
/// # Example
///
/// ```
/// use certgen_types::Endpoint;
///
/// let ep = Endpoint::new("master.example.com", 8443).unwrap();
/// assert_eq!(ep.to_string(), "master.example.com:8443");
/// assert_eq!(ep.name(), "master-example-com:8443");
/// assert_eq!(ep.server_url(), "https://master.example.com:8443");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create a new endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty or contains whitespace.
    pub fn new(host: impl AsRef<str>, port: u16) -> Result<Self> {
        let host = host.as_ref();
        if !Self::is_valid_host(host) {
            return Err(CertgenError::Validation(format!(
                "Invalid endpoint host '{}': must be non-empty and contain no whitespace",
                host
            )));
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// The loopback endpoint on `port`.
    pub fn localhost(port: u16) -> Self {
        Self {
            host: "localhost".to_string(),
            port,
        }
    }

    /// Check if a host is usable without allocating.
    pub fn is_valid_host(host: &str) -> bool {
        !host.is_empty() && !host.chars().any(char::is_whitespace)
    }

    /// Host part.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Kubeconfig cluster name: `host:port` with every `.` replaced by `-`.
    pub fn name(&self) -> String {
        self.to_string().replace('.', "-")
    }

    /// `https://host:port`
    pub fn server_url(&self) -> String {
        format!("https://{}", self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_endpoint_validation() {
        assert!(Endpoint::new("master-0", 8443).is_ok());
        assert!(Endpoint::new("10.0.0.5", 8443).is_ok());
        assert!(Endpoint::new("", 8443).is_err());
        assert!(Endpoint::new("bad host", 8443).is_err());
    }

    #[test]
    fn test_endpoint_name() {
        let ep = Endpoint::new("test-master-test-0", 8443).unwrap();
        assert_eq!(ep.name(), "test-master-test-0:8443");

        let ep = Endpoint::new("demo.westus2.cloudapp.azure.com", 8443).unwrap();
        assert_eq!(ep.name(), "demo-westus2-cloudapp-azure-com:8443");
        assert_eq!(Endpoint::localhost(8443).name(), "localhost:8443");
    }

    proptest! {
        #[test]
        fn prop_endpoint_name_has_no_dots(host in "[a-z0-9][a-z0-9.-]{0,40}", port in 1u16..) {
            let ep = Endpoint::new(&host, port).unwrap();
            let name = ep.name();
            prop_assert!(!name.contains('.'));
            prop_assert_eq!(name.len(), ep.to_string().len());
            let port_suffix = format!(":{}", port);
            prop_assert!(ep.server_url().ends_with(&port_suffix));
        }
    }
}
