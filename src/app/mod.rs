//! The Express style application wrapped by [`HttpStrategy`](crate::strategy::HttpStrategy).
//!
//! An [`App`] is an ordered stack of [`Layer`]s walked for every request:
//!
//! - middleware and routes run while no error is pending;
//! - error middleware runs only while an error is pending;
//! - each layer gets a one-shot [`Next`] to continue, to fail, or, by
//!   dropping it, to stop the walk.
//!
//! When the walk ends without a response having been sent, a pending error
//! is answered with its status code and logged, and an unmatched request is
//! answered with `404`.
//!
//! # Examples
//!
//! ```rust,ignore
//! use gantry::app::{middleware_fn, App, MethodFilter};
//!
//! let app = App::new();
//! app.route(
//!     MethodFilter::parse("get")?,
//!     "/ping",
//!     middleware_fn(|_request, response, _next| async move {
//!         let _ = response.send("pong");
//!     }),
//! )?;
//! ```

use std::{
    any::Any,
    collections::HashMap,
    convert::Infallible,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use bytes::Bytes;
use futures_util::FutureExt;
use http::{header, HeaderValue, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use log::{debug, error, warn};
use serde_json::Value;

use crate::{errors::GantryError, BoxFuture, POWERED_BY};

pub mod negotiate;
mod next;
mod request;
mod response;
pub mod route;
pub mod view;

pub(crate) use next::Flow;
pub use next::Next;
pub use request::Request;
pub use response::{Formats, Formatter, Payload, Response, JSON_SPACES_SETTING};
pub use route::{MethodFilter, Params, RoutePattern};
pub use view::{FileViewEngine, ViewEngine, VIEWS_SETTING};

/// Setting controlling the `X-Powered-By` header; enabled unless set to `false`.
pub static POWERED_BY_SETTING: &str = "x-powered-by";

/// Free-form application settings.
pub type Settings = HashMap<String, Value>;

/// Middleware and route callback: request, response, continuation.
pub type Middleware = Arc<dyn Fn(Request, Response, Next) -> BoxFuture<'static, ()> + Send + Sync>;

/// Error middleware callback. The error always comes first.
pub type ErrorMiddleware =
    Arc<dyn Fn(GantryError, Request, Response, Next) -> BoxFuture<'static, ()> + Send + Sync>;

/// Creates a [`Middleware`] from an async function.
pub fn middleware_fn<F, Fut>(f: F) -> Middleware
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |request, response, next| Box::pin(f(request, response, next)))
}

/// Creates an [`ErrorMiddleware`] from an async function.
pub fn error_middleware_fn<F, Fut>(f: F) -> ErrorMiddleware
where
    F: Fn(GantryError, Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |error, request, response, next| Box::pin(f(error, request, response, next)))
}

/// One entry of the application stack.
#[derive(Clone)]
pub enum Layer {
    /// Runs for every request under `mount` (every request when unmounted)
    Middleware { mount: Option<RoutePattern>, handler: Middleware },
    /// Runs for requests under `mount` while an error is pending
    Error { mount: Option<RoutePattern>, handler: ErrorMiddleware },
    /// Runs for requests whose method and whole path match
    Route { method: MethodFilter, pattern: RoutePattern, handler: Middleware },
}

impl Layer {
    pub fn middleware(handler: Middleware) -> Layer {
        Layer::Middleware { mount: None, handler }
    }

    pub fn error(handler: ErrorMiddleware) -> Layer {
        Layer::Error { mount: None, handler }
    }

    pub fn route(method: &str, path: &str, handler: Middleware) -> Result<Layer, GantryError> {
        Ok(Layer::Route {
            method: MethodFilter::parse(method)?,
            pattern: RoutePattern::parse(path)?,
            handler,
        })
    }

    /// Restricts a middleware or error middleware layer to paths under
    /// `path`. Routes keep their own pattern.
    pub fn mount(self, path: &str) -> Result<Layer, GantryError> {
        let pattern = RoutePattern::parse(path)?;
        Ok(match self {
            Layer::Middleware { handler, .. } => Layer::Middleware { mount: Some(pattern), handler },
            Layer::Error { handler, .. } => Layer::Error { mount: Some(pattern), handler },
            route @ Layer::Route { .. } => route,
        })
    }
}

fn mounted(mount: Option<&RoutePattern>, path: &str) -> Option<Params> {
    match mount {
        Some(pattern) => pattern.matches_prefix(path),
        None => Some(Arc::new(HashMap::new())),
    }
}

struct AppState {
    layers: Arc<Vec<Layer>>,
    settings: Arc<Settings>,
    engine: Option<Arc<dyn ViewEngine>>,
}

/// Handle to an application instance.
///
/// Cloning yields another handle to the same instance, which is how a
/// strategy and the listeners it starts share one stack. Layers added after
/// a listener started apply to the following requests.
#[derive(Clone)]
pub struct App {
    state: Arc<RwLock<AppState>>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> App {
        let mut settings = Settings::new();
        settings.insert(POWERED_BY_SETTING.to_string(), Value::Bool(true));

        App {
            state: Arc::new(RwLock::new(AppState {
                layers: Arc::new(Vec::new()),
                settings: Arc::new(settings),
                engine: None,
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AppState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AppState> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns whether both handles point at the same instance.
    pub fn same_instance(&self, other: &App) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Appends a layer to the stack.
    pub fn use_layer(&self, layer: Layer) -> &Self {
        let mut state = self.write();
        Arc::make_mut(&mut state.layers).push(layer);
        drop(state);
        self
    }

    /// Appends an unmounted middleware.
    pub fn use_middleware(&self, handler: Middleware) -> &Self {
        self.use_layer(Layer::middleware(handler))
    }

    /// Appends an unmounted error middleware.
    pub fn use_error(&self, handler: ErrorMiddleware) -> &Self {
        self.use_layer(Layer::error(handler))
    }

    /// Appends a route.
    pub fn route(
        &self,
        method: MethodFilter,
        path: &str,
        handler: Middleware,
    ) -> Result<&Self, GantryError> {
        let pattern = RoutePattern::parse(path)?;
        debug!("Registering route {:?} {}", method, pattern.pattern());
        Ok(self.use_layer(Layer::Route { method, pattern, handler }))
    }

    pub fn layer_count(&self) -> usize {
        self.read()
            .layers
            .len()
    }

    /// Stores a setting.
    pub fn set<V>(&self, key: &str, value: V) -> &Self
    where
        V: Into<Value>,
    {
        let mut state = self.write();
        Arc::make_mut(&mut state.settings).insert(key.to_string(), value.into());
        drop(state);
        self
    }

    pub fn setting(&self, key: &str) -> Option<Value> {
        self.read()
            .settings
            .get(key)
            .cloned()
    }

    /// Returns whether a setting is `true`.
    pub fn enabled(&self, key: &str) -> bool {
        self.setting(key)
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    /// Installs the view engine used by `Response::render`.
    pub fn engine(&self, engine: Arc<dyn ViewEngine>) -> &Self {
        self.write()
            .engine = Some(engine);
        self
    }

    /// Runs a request with a collected body through the stack.
    pub async fn handle(&self, request: http::Request<Bytes>) -> http::Response<Full<Bytes>> {
        let (layers, settings, engine) = {
            let state = self.read();
            (
                state
                    .layers
                    .clone(),
                state
                    .settings
                    .clone(),
                state
                    .engine
                    .clone(),
            )
        };

        let request = Request::from_http(request);
        let response = Response::for_request(&request, settings.clone(), engine);

        let powered_by = settings
            .get(POWERED_BY_SETTING)
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if powered_by {
            response.set_header("x-powered-by", HeaderValue::from_static(POWERED_BY));
        }

        let path = request
            .path()
            .to_string();
        let mut pending: Option<GantryError> = None;
        let mut halted = false;

        for layer in layers.iter() {
            let flow = match (layer, pending.take()) {
                (Layer::Middleware { mount, handler }, None) => {
                    let Some(params) = mounted(mount.as_ref(), &path) else {
                        continue;
                    };
                    let request = request.with_params(params);
                    let response = response.clone();
                    invoke(move |next| handler(request, response, next)).await
                }
                (Layer::Route { method, pattern, handler }, None) => {
                    if !method.allows(request.method()) {
                        continue;
                    }
                    let Some(params) = pattern.matches(&path) else {
                        continue;
                    };
                    debug!("{} {} matched {}", request.method(), path, pattern.pattern());
                    let request = request.with_params(params);
                    let response = response.clone();
                    invoke(move |next| handler(request, response, next)).await
                }
                (Layer::Error { mount, handler }, Some(error)) => {
                    let Some(params) = mounted(mount.as_ref(), &path) else {
                        pending = Some(error);
                        continue;
                    };
                    let request = request.with_params(params);
                    let response = response.clone();
                    invoke(move |next| handler(error, request, response, next)).await
                }
                (_, error) => {
                    pending = error;
                    continue;
                }
            };

            match flow {
                Some(Flow::Continue) => {}
                Some(Flow::Fail(error)) => pending = Some(error),
                None => {
                    halted = true;
                    break;
                }
            }
        }

        if let Some(error) = pending {
            if response.headers_sent() {
                warn!("{} {} failed after response was sent: {}", request.method(), path, error);
            } else {
                finish_with_error(&request, &response, error);
            }
        } else if !halted && !response.headers_sent() {
            response.status(StatusCode::NOT_FOUND);
            send_plain(&response, format!("Cannot {} {}", request.method(), path));
        }

        response.into_http()
    }

    /// Collects the body of an incoming hyper request and handles it.
    pub(crate) async fn serve(
        self,
        request: http::Request<Incoming>,
    ) -> Result<http::Response<Full<Bytes>>, Infallible> {
        let (parts, body) = request.into_parts();
        let body = match body
            .collect()
            .await
        {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                error!("Cannot read request body: {}", e);
                let mut response = http::Response::new(Full::new(Bytes::from_static(
                    b"Bad Request",
                )));
                *response.status_mut() = StatusCode::BAD_REQUEST;
                return Ok(response);
            }
        };

        Ok(self
            .handle(http::Request::from_parts(parts, body))
            .await)
    }
}

/// Calls one layer and waits for its decision.
///
/// `None` means the layer dropped its `Next`. A panic is turned into a
/// handler error so the request goes through the error chain.
async fn invoke<F>(call: F) -> Option<Flow>
where
    F: FnOnce(Next) -> BoxFuture<'static, ()>,
{
    let (next, receiver) = Next::channel();

    let future = match std::panic::catch_unwind(AssertUnwindSafe(move || call(next))) {
        Ok(future) => future,
        Err(panic) => return Some(panicked(panic)),
    };

    if let Err(panic) = AssertUnwindSafe(future)
        .catch_unwind()
        .await
    {
        return Some(panicked(panic));
    }

    receiver
        .await
        .ok()
}

fn panicked(panic: Box<dyn Any + Send>) -> Flow {
    let message = if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    };

    error!("Handler panicked: {}", message);
    Flow::Fail(GantryError::Handler(format!("Handler panicked: {}", message)))
}

fn finish_with_error(request: &Request, response: &Response, error: GantryError) {
    let status = error.status();
    error!("{} {} failed with {}: {}", request.method(), request.path(), status, error);

    let body = match &error {
        GantryError::Http(status, message) if status.is_client_error() => message.clone(),
        _ => status
            .canonical_reason()
            .unwrap_or("Error")
            .to_string(),
    };

    response.status(status);
    send_plain(response, body);
}

fn send_plain(response: &Response, body: String) {
    response.set_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    if let Err(e) = response.send(body) {
        warn!("Cannot send fallback response: {}", e);
    }
}
