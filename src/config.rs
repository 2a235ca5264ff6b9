//! Configuration builders and types for Gantry strategies.
//!
//! This module provides a fluent builder API for configuring:
//! - The strategy itself (protocol, optional TLS material)
//! - Security/TLS configuration (certificates, keys, client auth)
//!
//! # Examples
//!
//! ```rust,ignore
//! use gantry::config::{SecurityConfig, StrategyConfig};
//!
//! let security = SecurityConfig::builder()
//!     .cert_from_bytes(include_bytes!("server.der").to_vec())
//!     .key_from_bytes(include_bytes!("server.key.der").to_vec())
//!     .build()?;
//!
//! let config = StrategyConfig::builder()
//!     .security(security)
//!     .build();
//! ```

use std::fs;

use serde::Deserialize;

use crate::errors::{ConfigError, GantryError};

/// Backlog used when `start` is not given one.
pub const DEFAULT_BACKLOG: u32 = 511;

/// Supported HTTP protocols.
///
/// The protocol enum is feature-gated to only include protocols
/// that are enabled in the crate's feature flags.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[cfg(feature = "http1")]
    /// HTTP/1.1 protocol
    Http1,
    #[cfg(feature = "http2")]
    /// HTTP/2 protocol
    Http2,
}

/// Builder for creating `StrategyConfig` instances.
#[derive(Clone)]
pub struct StrategyConfigBuilder {
    protocol: Protocol,
    security: Option<SecurityConfig>,
}

impl StrategyConfigBuilder {
    /// Sets the HTTP protocol connections are served with.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets the TLS material. When present, `start` binds an encrypted
    /// listener instead of a plain one.
    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.security = Some(security);
        self
    }

    /// Creates the `StrategyConfig` with the configured settings.
    pub fn build(self) -> StrategyConfig {
        StrategyConfig { protocol: self.protocol, security: self.security }
    }
}

/// Options handed to a strategy when it is created.
///
/// # Examples
///
/// ```rust,ignore
/// use gantry::config::StrategyConfig;
///
/// let config = StrategyConfig::default();
/// assert!(!config.is_secure());
/// ```
#[derive(Clone)]
pub struct StrategyConfig {
    protocol: Protocol,
    security: Option<SecurityConfig>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::builder().build()
    }
}

impl StrategyConfig {
    /// Creates a new `StrategyConfigBuilder` with default settings.
    ///
    /// Default values:
    /// - protocol: the first protocol enabled by features
    /// - security: none (plain transport)
    pub fn builder() -> StrategyConfigBuilder {
        StrategyConfigBuilder { protocol: crate::default_protocol(), security: None }
    }

    /// Returns the HTTP protocol.
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Returns the TLS material, if any.
    pub fn security(&self) -> &Option<SecurityConfig> {
        &self.security
    }

    /// Returns whether listeners started from this config use TLS.
    pub fn is_secure(&self) -> bool {
        self.security
            .is_some()
    }
}

/// Builder for creating `SecurityConfig` instances.
///
/// File based setters read eagerly; a read failure is reported by
/// [`SecurityConfigBuilder::build`].
///
/// # Examples
///
/// ```rust,ignore
/// use gantry::config::SecurityConfig;
///
/// let security = SecurityConfig::builder()
///     .cert_from_file("certs/server.der")
///     .key_from_file("certs/server.key.der")
///     .build()?;
/// ```
#[derive(Clone, Default)]
pub struct SecurityConfigBuilder {
    cert: Vec<u8>,
    key: Vec<u8>,
    ca_cert: Option<Vec<u8>>,
    client_auth: bool,
    error: Option<String>,
}

impl SecurityConfigBuilder {
    /// Sets the DER encoded server certificate.
    pub fn cert_from_bytes(mut self, cert: Vec<u8>) -> Self {
        self.cert = cert;
        self
    }

    /// Reads the DER encoded server certificate from `path`.
    pub fn cert_from_file(mut self, path: &str) -> Self {
        match fs::read(path) {
            Ok(cert) => self.cert = cert,
            Err(e) => self.record(format!("Cannot read certificate {}: {}", path, e)),
        }
        self
    }

    /// Sets the DER encoded private key.
    pub fn key_from_bytes(mut self, key: Vec<u8>) -> Self {
        self.key = key;
        self
    }

    /// Reads the DER encoded private key from `path`.
    pub fn key_from_file(mut self, path: &str) -> Self {
        match fs::read(path) {
            Ok(key) => self.key = key,
            Err(e) => self.record(format!("Cannot read private key {}: {}", path, e)),
        }
        self
    }

    /// Sets the DER encoded CA certificate.
    ///
    /// It is appended to the served chain and, with client auth enabled,
    /// used as the trust root for client certificates.
    pub fn ca_cert_from_bytes(mut self, ca_cert: Vec<u8>) -> Self {
        self.ca_cert = Some(ca_cert);
        self
    }

    /// Reads the DER encoded CA certificate from `path`.
    pub fn ca_cert_from_file(mut self, path: &str) -> Self {
        match fs::read(path) {
            Ok(ca_cert) => self.ca_cert = Some(ca_cert),
            Err(e) => self.record(format!("Cannot read CA certificate {}: {}", path, e)),
        }
        self
    }

    /// Requires clients to present a certificate signed by the CA.
    pub fn client_auth(mut self, client_auth: bool) -> Self {
        self.client_auth = client_auth;
        self
    }

    fn record(&mut self, error: String) {
        if self
            .error
            .is_none()
        {
            self.error = Some(error);
        }
    }

    /// Creates the `SecurityConfig`, validating the collected material.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Security` if a file could not be read, the
    /// certificate or key is empty, or client auth is requested without a
    /// CA certificate.
    pub fn build(self) -> Result<SecurityConfig, GantryError> {
        if let Some(error) = self.error {
            return Err(ConfigError::Security(error).into());
        }

        if self
            .cert
            .is_empty()
        {
            return Err(ConfigError::Security("Certificate is empty".to_string()).into());
        }

        if self
            .key
            .is_empty()
        {
            return Err(ConfigError::Security("Private key is empty".to_string()).into());
        }

        if self.client_auth
            && self
                .ca_cert
                .is_none()
        {
            return Err(ConfigError::Security(
                "Client auth requires a CA certificate".to_string(),
            )
            .into());
        }

        Ok(SecurityConfig {
            cert: self.cert,
            key: self.key,
            ca_cert: self.ca_cert,
            client_auth: self.client_auth,
        })
    }
}

/// Security configuration for TLS/SSL.
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    cert: Vec<u8>,
    key: Vec<u8>,
    ca_cert: Option<Vec<u8>>,
    client_auth: bool,
}

impl SecurityConfig {
    /// Creates a new, empty `SecurityConfigBuilder`.
    pub fn builder() -> SecurityConfigBuilder {
        SecurityConfigBuilder::default()
    }

    pub fn cert(&self) -> &[u8] {
        &self.cert
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn ca_cert(&self) -> Option<&[u8]> {
        self.ca_cert
            .as_deref()
    }

    pub fn client_auth(&self) -> bool {
        self.client_auth
    }
}
