//! The server strategy interface and its hyper backed implementation.
//!
//! A host framework drives whichever web server it runs on through
//! [`ServerStrategy`]: it registers routes with normalized handlers, asks the
//! strategy to start and stop listening, and hands handler results to a
//! single output handler. [`HttpStrategy`] implements the interface on top of
//! the crate's [`App`](crate::app::App).
//!
//! # Modules
//!
//! - [`http`]: the [`HttpStrategy`] backend
//! - [`output`]: handler results and their rendering
//!
//! # Examples
//!
//! ```rust,ignore
//! use gantry::{
//!     config::StrategyConfig,
//!     strategy::{exception_fn, route_fn, HttpStrategy, ServerStrategy},
//! };
//!
//! let mut strategy = HttpStrategy::new(StrategyConfig::default());
//! strategy.add_route("post", "/users", route_fn(|_request, response| async move {
//!     response.status(http::StatusCode::CREATED);
//!     response.send("created")
//! }))?;
//! strategy.uncaught_exception(exception_fn(|request, _response, error, next| async move {
//!     log::error!("{} failed: {}", request.path(), error);
//!     next.fail(error);
//! }));
//! ```

use std::{future::Future, net::SocketAddr, sync::Arc};

use ::http::StatusCode;
use serde_json::Value;

use crate::{
    app::{Layer, Next, Request, Response},
    errors::GantryError,
    BoxFuture,
};

pub mod http;
pub mod output;

pub use self::http::HttpStrategy;
pub use output::{render_output, Output, Renderable, View, ViewBuilder};

/// Normalized route handler.
///
/// Resolving with `Err` hands the error to the application's error chain.
pub type RouteHandler =
    Arc<dyn Fn(Request, Response) -> BoxFuture<'static, Result<(), GantryError>> + Send + Sync>;

/// Host handler for errors nobody else answered: request, response, error,
/// continuation.
pub type ExceptionHandler =
    Arc<dyn Fn(Request, Response, GantryError, Next) -> BoxFuture<'static, ()> + Send + Sync>;

/// Creates a [`RouteHandler`] from an async function.
pub fn route_fn<F, Fut>(f: F) -> RouteHandler
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), GantryError>> + Send + 'static,
{
    Arc::new(move |request, response| Box::pin(f(request, response)))
}

/// Creates an [`ExceptionHandler`] from an async function.
pub fn exception_fn<F, Fut>(f: F) -> ExceptionHandler
where
    F: Fn(Request, Response, GantryError, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |request, response, error, next| Box::pin(f(request, response, error, next)))
}

/// Interface a host framework uses to drive a web server.
///
/// Every backend answers the same calls; the host never touches the
/// underlying server directly except through [`ServerStrategy::server`].
pub trait ServerStrategy {
    /// The wrapped application type.
    type Server;

    /// Registers `handler` for `method` (case-insensitive, `all` for any
    /// method) and `route`.
    ///
    /// # Errors
    ///
    /// Returns an error if the method or the route pattern is invalid.
    fn add_route(
        &mut self,
        method: &str,
        route: &str,
        handler: RouteHandler,
    ) -> Result<(), GantryError>;

    /// Stops the active listener.
    ///
    /// # Errors
    ///
    /// Returns [`GantryError::NoListener`] when nothing is listening.
    fn close(&mut self) -> impl Future<Output = Result<(), GantryError>>;

    /// Returns the wrapped application.
    fn server(&self) -> &Self::Server;

    /// Returns the raw underlying server object.
    fn raw_server(&self) -> &Self::Server {
        self.server()
    }

    /// Writes a handler's output to `response`, negotiating between html
    /// and json for renderable outputs.
    fn output_handler(
        &self,
        status: StatusCode,
        output: Output,
        request: &Request,
        response: &Response,
    ) -> Result<(), GantryError>;

    /// Stores an application setting.
    fn set(&mut self, key: &str, value: Value) -> &mut Self;

    /// Starts listening on `hostname:port`, over TLS when the strategy was
    /// configured with security material. Resolves with the bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if TLS setup, resolution or binding fails, or if the
    /// strategy is already listening.
    fn start(
        &mut self,
        port: u16,
        hostname: &str,
        backlog: Option<u32>,
    ) -> impl Future<Output = Result<SocketAddr, GantryError>>;

    /// Registers the host's handler for errors left unanswered.
    fn uncaught_exception(&mut self, handler: ExceptionHandler) -> &mut Self;

    /// Appends a layer to the application stack.
    fn use_middleware(&mut self, layer: Layer) -> &mut Self;
}
