use std::sync::Arc;

use log::debug;
use rustls::{
    pki_types::{CertificateDer, PrivateKeyDer},
    server::WebPkiClientVerifier,
    RootCertStore, ServerConfig,
};
use tokio_rustls::TlsAcceptor;

use crate::{
    config::SecurityConfig,
    errors::{GantryError, StartError::Tls},
};

pub struct TlsFactory {}

impl TlsFactory {
    /// Builds the acceptor wrapping plain connections of a secure listener.
    pub fn create_acceptor(
        security: &SecurityConfig,
        alpn_protocols: Vec<Vec<u8>>,
    ) -> Result<TlsAcceptor, GantryError> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

        let mut chain = vec![CertificateDer::from(
            security
                .cert()
                .to_vec(),
        )];
        if let Some(ca_cert) = security.ca_cert() {
            chain.push(CertificateDer::from(ca_cert.to_vec()));
        }

        let key = PrivateKeyDer::try_from(
            security
                .key()
                .to_vec(),
        )
        .map_err(|e| Tls(format!("Failed to parse private key: {}", e)))?;

        let builder = ServerConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| Tls(e.to_string()))?;

        let builder = match (security.client_auth(), security.ca_cert()) {
            (true, Some(ca_cert)) => {
                let mut roots = RootCertStore::empty();
                roots
                    .add(CertificateDer::from(ca_cert.to_vec()))
                    .map_err(|e| Tls(format!("Failed to parse CA certificate: {}", e)))?;
                let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                    .build()
                    .map_err(|e| Tls(format!("Failed to create client verifier: {}", e)))?;
                debug!("Client certificate verification enabled");
                builder.with_client_cert_verifier(verifier)
            }
            _ => builder.with_no_client_auth(),
        };

        let mut tls_config = builder
            .with_single_cert(chain, key)
            .map_err(|e| Tls(format!("Failed to create certified key: {}", e)))?;

        tls_config.alpn_protocols = alpn_protocols;

        Ok(TlsAcceptor::from(Arc::new(tls_config)))
    }
}
