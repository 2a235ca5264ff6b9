use std::error::Error;

use crate::{
    config::{Protocol, SecurityConfig, StrategyConfig},
    errors::{ConfigError, GantryError},
};

#[test]
fn test_strategy_config_defaults() {
    let config = StrategyConfig::default();

    #[cfg(feature = "http1")]
    assert_eq!(config.protocol(), &Protocol::Http1);
    #[cfg(all(feature = "http2", not(feature = "http1")))]
    assert_eq!(config.protocol(), &Protocol::Http2);

    assert!(!config.is_secure());
    assert!(config
        .security()
        .is_none());
}

#[test]
fn test_strategy_config_with_security() -> Result<(), Box<dyn Error>> {
    let security = SecurityConfig::builder()
        .cert_from_bytes(vec![1, 2, 3])
        .key_from_bytes(vec![4, 5, 6])
        .build()?;

    let config = StrategyConfig::builder()
        .security(security)
        .build();

    assert!(config.is_secure());
    let security = config
        .security()
        .as_ref()
        .ok_or("security should be set")?;
    assert_eq!(security.cert(), &[1, 2, 3]);
    assert_eq!(security.key(), &[4, 5, 6]);
    assert_eq!(security.ca_cert(), None);
    assert!(!security.client_auth());

    Ok(())
}

#[test]
fn test_security_config_requires_cert() {
    let security_config = SecurityConfig::builder()
        .key_from_bytes(vec![1])
        .build();

    assert_eq!(
        security_config.err(),
        Some(GantryError::Config(ConfigError::Security("Certificate is empty".to_string())))
    );
}

#[test]
fn test_security_config_requires_key() {
    let security_config = SecurityConfig::builder()
        .cert_from_bytes(vec![1])
        .build();

    assert_eq!(
        security_config.err(),
        Some(GantryError::Config(ConfigError::Security("Private key is empty".to_string())))
    );
}

#[test]
fn test_client_auth_requires_ca_cert() {
    let security_config = SecurityConfig::builder()
        .cert_from_bytes(vec![1])
        .key_from_bytes(vec![2])
        .client_auth(true)
        .build();

    assert_eq!(
        security_config.err(),
        Some(GantryError::Config(ConfigError::Security(
            "Client auth requires a CA certificate".to_string()
        )))
    );
}

#[test]
fn test_security_config_from_files() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let cert = dir
        .path()
        .join("server.der");
    let key = dir
        .path()
        .join("server.key.der");
    let ca = dir
        .path()
        .join("ca.der");
    std::fs::write(&cert, b"cert")?;
    std::fs::write(&key, b"key")?;
    std::fs::write(&ca, b"ca")?;

    let security = SecurityConfig::builder()
        .cert_from_file(&cert.to_string_lossy())
        .key_from_file(&key.to_string_lossy())
        .ca_cert_from_file(&ca.to_string_lossy())
        .client_auth(true)
        .build()?;

    assert_eq!(security.cert(), b"cert");
    assert_eq!(security.key(), b"key");
    assert_eq!(security.ca_cert(), Some(&b"ca"[..]));
    assert!(security.client_auth());

    Ok(())
}

#[test]
fn test_security_config_reports_missing_file() {
    let security_config = SecurityConfig::builder()
        .cert_from_file("/nonexistent/gantry/server.der")
        .key_from_bytes(vec![1])
        .build();

    match security_config {
        Err(GantryError::Config(ConfigError::Security(message))) => {
            assert!(message.starts_with("Cannot read certificate /nonexistent/gantry/server.der"));
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_protocol_from_yaml() -> Result<(), Box<dyn Error>> {
    #[cfg(feature = "http1")]
    assert_eq!(serde_yaml_ng::from_str::<Protocol>("http1")?, Protocol::Http1);
    #[cfg(feature = "http2")]
    assert_eq!(serde_yaml_ng::from_str::<Protocol>("http2")?, Protocol::Http2);
    Ok(())
}
