//! Error handling types for Gantry.
//!
//! Every fallible operation in the crate returns [`GantryError`]. Route
//! handlers fail with it too, which is what lets a rejected handler travel
//! through the app's error-middleware chain unchanged.
//!
//! # Examples
//!
//! ```rust,ignore
//! use gantry::errors::{GantryError, StartError};
//!
//! match strategy.start(8080, "0.0.0.0", None).await {
//!     Ok(addr) => println!("Listening on {}", addr),
//!     Err(GantryError::Start(StartError::Tls(msg))) => eprintln!("TLS setup failed: {}", msg),
//!     Err(other) => eprintln!("Other error: {}", other),
//! }
//! ```

use http::StatusCode;
use thiserror::Error;

/// Main error type for Gantry operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GantryError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Failed to resolve or bind a network address
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    /// Listener startup errors
    #[error("Failed to start server: {0}")]
    Start(#[from] StartError),

    /// Listener shutdown errors
    #[error("Failed to stop server: {0}")]
    Stop(String),

    /// A route handler or middleware failed
    #[error("Handler error: {0}")]
    Handler(String),

    /// A failure that carries the HTTP status it should be answered with
    #[error("{1}")]
    Http(StatusCode, String),

    /// Template rendering failed
    #[error("Render error: {0}")]
    Render(String),

    /// None of the offered formats is acceptable to the client
    #[error("Not Acceptable")]
    NotAcceptable,

    /// The response was already sent
    #[error("Headers already sent")]
    HeadersSent,

    /// `close` called while nothing is listening
    #[error("No active listener")]
    NoListener,

    /// `start` called while a listener is already active
    #[error("Listener already active")]
    AlreadyListening,

    /// Route registration errors
    #[error("Route error: {0}")]
    Route(#[from] RouteError),
}

impl GantryError {
    /// Status code used when this error reaches the end of the error chain
    /// without any middleware answering it.
    pub fn status(&self) -> StatusCode {
        match self {
            GantryError::Http(status, _) => *status,
            GantryError::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// Invalid TLS material
    #[error("Invalid security config: {0}")]
    Security(String),
}

/// Listener startup errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StartError {
    /// TLS/SSL initialization errors
    #[error("Tls initialization: {0}")]
    Tls(String),
}

/// Route registration errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouteError {
    /// The method is not a valid HTTP method token
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// The route pattern cannot be used
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}
