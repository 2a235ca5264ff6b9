use std::net::SocketAddr;

use http::StatusCode;
use log::{debug, warn};
use serde_json::Value;

use crate::{
    app::{error_middleware_fn, middleware_fn, App, Layer, MethodFilter, Next, Request, Response},
    config::{StrategyConfig, DEFAULT_BACKLOG},
    errors::GantryError,
    server::{Listener, TcpListener, Transport},
    strategy::{render_output, ExceptionHandler, Output, RouteHandler, ServerStrategy},
};

/// [`ServerStrategy`] backed by the crate's [`App`] on hyper.
///
/// One app instance is created with the strategy and shared by every
/// listener it starts, plain or TLS.
pub struct HttpStrategy {
    config: StrategyConfig,
    app: App,
    listener: Option<TcpListener>,
}

impl HttpStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config, app: App::new(), listener: None }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Returns the active listener, if any.
    pub fn listener(&self) -> Option<&TcpListener> {
        self.listener
            .as_ref()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .as_ref()
            .and_then(TcpListener::local_addr)
    }
}

impl Default for HttpStrategy {
    fn default() -> Self {
        Self::new(StrategyConfig::default())
    }
}

impl ServerStrategy for HttpStrategy {
    type Server = App;

    fn add_route(
        &mut self,
        method: &str,
        route: &str,
        handler: RouteHandler,
    ) -> Result<(), GantryError> {
        let method = MethodFilter::parse(method)?;

        let middleware = middleware_fn(move |request: Request, response: Response, next: Next| {
            let handler = handler.clone();
            async move {
                let method = request
                    .method()
                    .clone();
                let path = request
                    .path()
                    .to_string();

                if let Err(error) = handler(request, response).await {
                    warn!("Route handler for {} {} failed: {}", method, path, error);
                    next.fail(error);
                }
            }
        });

        self.app
            .route(method, route, middleware)?;

        Ok(())
    }

    async fn close(&mut self) -> Result<(), GantryError> {
        match self
            .listener
            .take()
        {
            Some(mut listener) => {
                listener
                    .stop()
                    .await
            }
            None => Err(GantryError::NoListener),
        }
    }

    fn server(&self) -> &App {
        &self.app
    }

    fn output_handler(
        &self,
        status: StatusCode,
        output: Output,
        request: &Request,
        response: &Response,
    ) -> Result<(), GantryError> {
        render_output(status, output, request, response)
    }

    fn set(&mut self, key: &str, value: Value) -> &mut Self {
        self.app
            .set(key, value);
        self
    }

    async fn start(
        &mut self,
        port: u16,
        hostname: &str,
        backlog: Option<u32>,
    ) -> Result<SocketAddr, GantryError> {
        if self
            .listener
            .as_ref()
            .is_some_and(TcpListener::is_listening)
        {
            return Err(GantryError::AlreadyListening);
        }

        let transport = Transport::from_config(&self.config)?;
        debug!(
            "Starting {} listener on {}:{}",
            if transport.is_secure() { "tls" } else { "plain" },
            hostname,
            port
        );

        let mut listener = TcpListener::new(
            self.app
                .clone(),
            self.config
                .protocol()
                .clone(),
            transport,
        );

        let addr = listener
            .listen(port, hostname, backlog.unwrap_or(DEFAULT_BACKLOG))
            .await?;

        self.listener = Some(listener);

        Ok(addr)
    }

    fn uncaught_exception(&mut self, handler: ExceptionHandler) -> &mut Self {
        self.app
            .use_error(error_middleware_fn(move |error, request, response, next| {
                handler(request, response, error, next)
            }));
        self
    }

    fn use_middleware(&mut self, layer: Layer) -> &mut Self {
        self.app
            .use_layer(layer);
        self
    }
}
