//! Listener lifecycle and connection serving.
//!
//! A [`Listener`] binds a socket, accepts connections on a background task
//! and serves each one on a worker through hyper, against the [`App`] it was
//! created with. The [`Transport`] decides whether accepted connections are
//! wrapped in TLS first; both transports serve the same app instance.
//!
//! # Modules
//!
//! - [`listener`]: TCP listener with backlog control
//! - [`tls`]: rustls acceptor construction

use std::{future::Future, net::SocketAddr, pin::Pin};

#[cfg(feature = "tokio-rust-tls")]
use tokio_rustls::TlsAcceptor;

use crate::{
    config::{Protocol, StrategyConfig},
    errors::GantryError,
};

#[cfg(not(feature = "tokio-rust-tls"))]
use crate::errors::StartError;

pub mod listener;
#[cfg(feature = "tokio-rust-tls")]
pub mod tls;

pub use listener::TcpListener;

pub type ListenerResult<'a, T> = Pin<Box<dyn Future<Output = Result<T, GantryError>> + Send + 'a>>;

/// Trait for listener implementations.
pub trait Listener {
    /// Binds `hostname:port` with the given backlog and starts accepting
    /// connections. Resolves with the bound address.
    fn listen(&mut self, port: u16, hostname: &str, backlog: u32) -> ListenerResult<SocketAddr>;

    /// Stops accepting connections. Connections already accepted run to
    /// completion.
    fn stop(&mut self) -> ListenerResult<()>;
}

/// How accepted connections are carried.
#[derive(Clone)]
pub enum Transport {
    Plain,
    #[cfg(feature = "tokio-rust-tls")]
    Tls(TlsAcceptor),
}

impl Transport {
    /// Chooses TLS when the config holds security material.
    pub fn from_config(config: &StrategyConfig) -> Result<Transport, GantryError> {
        let Some(security) = config.security() else {
            return Ok(Transport::Plain);
        };

        cfg_if::cfg_if! {
            if #[cfg(feature = "tokio-rust-tls")] {
                let acceptor = tls::TlsFactory::create_acceptor(security, alpn_protocols(config.protocol()))?;
                Ok(Transport::Tls(acceptor))
            } else {
                let _ = security;
                Err(StartError::Tls("TLS support is not enabled".to_string()).into())
            }
        }
    }

    pub fn is_secure(&self) -> bool {
        match self {
            Transport::Plain => false,
            #[cfg(feature = "tokio-rust-tls")]
            Transport::Tls(_) => true,
        }
    }
}

#[cfg_attr(not(feature = "tokio-rust-tls"), allow(dead_code))]
fn alpn_protocols(protocol: &Protocol) -> Vec<Vec<u8>> {
    match protocol {
        #[cfg(feature = "http1")]
        Protocol::Http1 => vec![b"http/1.1".to_vec()],
        #[cfg(feature = "http2")]
        Protocol::Http2 => vec![b"h2".to_vec()],
    }
}
