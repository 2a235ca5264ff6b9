//! # Gantry
//!
//! **A pluggable HTTP server strategy for host application frameworks**
//!
//! A host framework that can run on top of interchangeable web servers talks to
//! one narrow interface, [`ServerStrategy`]. Gantry's [`HttpStrategy`] is one
//! such backend: it wraps a small Express style [`App`] built on hyper and
//! tokio, and translates the host's generic calls into calls on that app.
//!
//! ## Features
//!
//! - **Normalized handlers**: route handlers are plain async functions returning
//!   `Result`; failures are forwarded into the app's error middleware chain
//! - **Single rendering entry point**: [`ServerStrategy::output_handler`] turns
//!   a handler's [`Output`] into an html or json response by content negotiation
//! - **Plain or TLS transport**: chosen from the strategy configuration
//! - **Feature-Gated**: HTTP/1 and HTTP/2, TLS via rustls
//!
//! ## Basic Usage
//!
//! ```rust,ignore
//! use gantry::{
//!     config::StrategyConfig,
//!     strategy::{route_fn, HttpStrategy, Output, ServerStrategy, View},
//! };
//! use http::StatusCode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut strategy = HttpStrategy::new(StrategyConfig::default());
//!
//!     strategy.add_route("GET", "/hello/:name", route_fn(|request, response| async move {
//!         let name = request.param("name").unwrap_or_default().to_string();
//!         let view = View::builder()
//!             .template("hello")
//!             .data(serde_json::json!({ "name": name }))
//!             .build();
//!         gantry::strategy::render_output(StatusCode::OK, Output::view(view), &request, &response)
//!     }))?;
//!
//!     strategy.start(8080, "0.0.0.0", None).await?;
//!     tokio::signal::ctrl_c().await?;
//!     strategy.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`app`]: the wrapped Express style application (layers, request, response)
//! - [`config`]: strategy and TLS configuration builders
//! - [`errors`]: error types
//! - [`server`]: listener lifecycle and connection serving
//! - [`strategy`]: the strategy interface and its hyper backed implementation

#[cfg(not(any(feature = "http1", feature = "http2")))]
compile_error!("At least one of http1 or http2 must be enabled!");

use std::{future::Future, pin::Pin};

use crate::config::Protocol;

pub mod app;
pub mod config;
pub mod errors;
pub mod server;
pub mod strategy;
mod tests;

pub use app::{App, Layer, Next, Payload, Request, Response};
pub use errors::GantryError;
pub use strategy::{HttpStrategy, Output, Renderable, ServerStrategy, View};

/// Boxed, sendable future used by every handler type in the crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Name advertised in the `X-Powered-By` header.
pub static POWERED_BY: &str = "Gantry";

pub(crate) const fn default_protocol() -> Protocol {
    cfg_if::cfg_if! {
        if #[cfg(feature="http1")] {
            Protocol::Http1
        } else {
            Protocol::Http2
        }
    }
}
