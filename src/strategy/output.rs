use http::{HeaderMap, StatusCode};
use log::debug;
use serde_json::Value;

use crate::{
    app::{Formats, Payload, Request, Response},
    errors::GantryError,
};

/// Capability of a handler result that knows how to present itself.
///
/// A renderable result can override the status code, contribute headers,
/// and offers a template plus data: the template is rendered for markup
/// clients, the data is serialized for JSON clients.
pub trait Renderable: Send + Sync {
    /// Status code replacing the one the host asked for, if any.
    fn status_code(&self) -> Option<StatusCode>;

    fn headers(&self) -> HeaderMap;

    fn render_template(&self) -> &str;

    fn render_data(&self) -> &Value;
}

/// What a route handler produced, as handed to the output handler.
pub enum Output {
    /// A result exposing the rendering capability
    View(Box<dyn Renderable>),
    /// Anything else, sent as is
    Raw(Payload),
}

impl Output {
    pub fn view<R>(renderable: R) -> Output
    where
        R: Renderable + 'static,
    {
        Output::View(Box::new(renderable))
    }

    pub fn raw<P>(payload: P) -> Output
    where
        P: Into<Payload>,
    {
        Output::Raw(payload.into())
    }
}

/// Builder for [`View`].
#[derive(Default)]
pub struct ViewBuilder {
    status_code: Option<StatusCode>,
    headers: HeaderMap,
    template: String,
    data: Value,
}

impl ViewBuilder {
    pub fn status_code(mut self, status_code: StatusCode) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn header<K>(mut self, key: K, value: http::header::HeaderValue) -> Self
    where
        K: http::header::IntoHeaderName,
    {
        self.headers
            .append(key, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn template(mut self, template: &str) -> Self {
        self.template = template.to_string();
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn build(self) -> View {
        View {
            status_code: self.status_code,
            headers: self.headers,
            template: self.template,
            data: self.data,
        }
    }
}

/// Stock [`Renderable`]: a template name, its data, and optional status
/// code and headers.
///
/// # Examples
///
/// ```rust,ignore
/// use gantry::strategy::{Output, View};
/// use http::StatusCode;
///
/// let view = View::builder()
///     .status_code(StatusCode::CREATED)
///     .template("users/show")
///     .data(serde_json::json!({ "id": 7 }))
///     .build();
/// let output = Output::view(view);
/// ```
#[derive(Clone, Debug)]
pub struct View {
    status_code: Option<StatusCode>,
    headers: HeaderMap,
    template: String,
    data: Value,
}

impl View {
    pub fn builder() -> ViewBuilder {
        ViewBuilder::default()
    }
}

impl Renderable for View {
    fn status_code(&self) -> Option<StatusCode> {
        self.status_code
    }

    fn headers(&self) -> HeaderMap {
        self.headers
            .clone()
    }

    fn render_template(&self) -> &str {
        &self.template
    }

    fn render_data(&self) -> &Value {
        &self.data
    }
}

/// Writes a handler's output to `response`.
///
/// Does nothing when the response has already been sent. Otherwise sets
/// `status`; a renderable output may then replace the status and add
/// headers before html (template) or json (data) is chosen from the
/// request's `Accept` header, html first. Raw output is sent unchanged.
pub fn render_output(
    status: StatusCode,
    output: Output,
    _request: &Request,
    response: &Response,
) -> Result<(), GantryError> {
    if response.headers_sent() {
        debug!("Response already sent, skipping output");
        return Ok(());
    }

    response.status(status);

    let renderable = match output {
        Output::View(renderable) => renderable,
        Output::Raw(payload) => return response.send(payload),
    };

    if let Some(status_code) = renderable.status_code() {
        response.status(status_code);
    }

    response.extend_headers(renderable.headers());

    let template = renderable.render_template();
    let data = renderable.render_data();

    response.format(
        Formats::new()
            .html(|response| response.render(template, data))
            .json(|response| response.json(data)),
    )
}
