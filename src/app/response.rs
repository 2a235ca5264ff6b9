use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::{
    header::{self, HeaderName, HeaderValue, IntoHeaderName},
    HeaderMap, Method, StatusCode,
};
use http_body_util::Full;
use mime::Mime;
use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Value};

use crate::{
    app::{negotiate::negotiate, view::ViewEngine, Request, Settings},
    errors::GantryError,
};

/// Setting controlling JSON indentation; a positive number pretty-prints.
pub static JSON_SPACES_SETTING: &str = "json spaces";

/// Indentation wider than this is clamped.
const MAX_JSON_SPACES: u64 = 10;

/// A body handed to [`Response::send`].
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Empty,
    /// Text, sent as `text/html` unless a content type is already set
    Text(String),
    /// Structured data, sent as `application/json`
    Json(Value),
    /// Raw bytes, sent as `application/octet-stream` unless a content type is already set
    Bytes(Bytes),
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Empty
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(bytes))
    }
}

/// Callback answering one negotiated format.
pub type Formatter<'a> = Box<dyn FnOnce(&Response) -> Result<(), GantryError> + 'a>;

/// Ordered set of formatters for [`Response::format`].
///
/// The first registered format is used when the client expresses no
/// preference.
///
/// # Examples
///
/// ```rust,ignore
/// use gantry::app::Formats;
///
/// response.format(
///     Formats::new()
///         .html(|response| response.render("index", &data))
///         .json(|response| response.json(&data)),
/// )?;
/// ```
#[derive(Default)]
pub struct Formats<'a> {
    entries: Vec<(Mime, Formatter<'a>)>,
    fallback: Option<Formatter<'a>>,
}

impl<'a> Formats<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, mime: Mime, formatter: F) -> Self
    where
        F: FnOnce(&Response) -> Result<(), GantryError> + 'a,
    {
        self.entries
            .push((mime, Box::new(formatter)));
        self
    }

    pub fn html<F>(self, formatter: F) -> Self
    where
        F: FnOnce(&Response) -> Result<(), GantryError> + 'a,
    {
        self.on(mime::TEXT_HTML, formatter)
    }

    pub fn json<F>(self, formatter: F) -> Self
    where
        F: FnOnce(&Response) -> Result<(), GantryError> + 'a,
    {
        self.on(mime::APPLICATION_JSON, formatter)
    }

    pub fn text<F>(self, formatter: F) -> Self
    where
        F: FnOnce(&Response) -> Result<(), GantryError> + 'a,
    {
        self.on(mime::TEXT_PLAIN, formatter)
    }

    /// Called when no registered format is acceptable, instead of failing
    /// with `NotAcceptable`.
    pub fn fallback<F>(mut self, formatter: F) -> Self
    where
        F: FnOnce(&Response) -> Result<(), GantryError> + 'a,
    {
        self.fallback = Some(Box::new(formatter));
        self
    }

    pub fn mimes(&self) -> Vec<Mime> {
        self.entries
            .iter()
            .map(|(mime, _)| mime.clone())
            .collect()
    }
}

#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    sent: bool,
}

/// Outgoing response shared by every layer handling a request.
///
/// Cloning shares the same response. Nothing reaches the client until the
/// dispatcher finishes the request; once one of the sending methods
/// (`send`, `json`, `render`) has run, the response counts as sent and
/// further sends fail with [`GantryError::HeadersSent`].
#[derive(Clone)]
pub struct Response {
    state: Arc<Mutex<ResponseState>>,
    accept: Option<Arc<str>>,
    head: bool,
    settings: Arc<Settings>,
    engine: Option<Arc<dyn ViewEngine>>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// Creates a detached response: no request context, no view engine,
    /// default settings.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ResponseState {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::new(),
                sent: false,
            })),
            accept: None,
            head: false,
            settings: Arc::new(Settings::new()),
            engine: None,
        }
    }

    /// Creates a response bound to `request`, rendering through `engine`.
    pub fn for_request(
        request: &Request,
        settings: Arc<Settings>,
        engine: Option<Arc<dyn ViewEngine>>,
    ) -> Self {
        let mut response = Self::new();
        response.accept = request
            .header(header::ACCEPT.as_str())
            .map(Arc::from);
        response.head = *request.method() == Method::HEAD;
        response.settings = settings;
        response.engine = engine;
        response
    }

    fn state(&self) -> MutexGuard<'_, ResponseState> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns whether the response has already been sent.
    pub fn headers_sent(&self) -> bool {
        self.state()
            .sent
    }

    /// Sets the status code.
    pub fn status(&self, status: StatusCode) -> &Self {
        self.state()
            .status = status;
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.state()
            .status
    }

    /// Sets a header, replacing any previous values.
    pub fn set_header<K>(&self, name: K, value: HeaderValue) -> &Self
    where
        K: IntoHeaderName,
    {
        self.state()
            .headers
            .insert(name, value);
        self
    }

    /// Appends a header value, keeping previous values.
    pub fn append_header<K>(&self, name: K, value: HeaderValue) -> &Self
    where
        K: IntoHeaderName,
    {
        self.state()
            .headers
            .append(name, value);
        self
    }

    /// Sets every header in `headers`, replacing previous values of the same
    /// names.
    pub fn extend_headers(&self, headers: HeaderMap) -> &Self {
        let mut state = self.state();
        for name in headers.keys() {
            state
                .headers
                .remove(name);
        }
        for (name, value) in headers.iter() {
            state
                .headers
                .append(name.clone(), value.clone());
        }
        drop(state);
        self
    }

    pub fn headers(&self) -> HeaderMap {
        self.state()
            .headers
            .clone()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.state()
            .headers
            .get(name)
            .and_then(|value| {
                value
                    .to_str()
                    .ok()
                    .map(str::to_string)
            })
    }

    /// Returns the body written so far.
    pub fn body(&self) -> Bytes {
        self.state()
            .body
            .clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Sends `payload` and marks the response as sent.
    pub fn send<P>(&self, payload: P) -> Result<(), GantryError>
    where
        P: Into<Payload>,
    {
        let (body, content_type) = match payload.into() {
            Payload::Empty => (Bytes::new(), None),
            Payload::Text(text) => (Bytes::from(text), Some("text/html; charset=utf-8")),
            Payload::Bytes(bytes) => (bytes, Some("application/octet-stream")),
            Payload::Json(value) => return self.json(&value),
        };
        self.write(body, content_type)
    }

    /// Serializes `value` and sends it as `application/json`.
    ///
    /// Honours the `json spaces` setting.
    pub fn json<T>(&self, value: &T) -> Result<(), GantryError>
    where
        T: Serialize + ?Sized,
    {
        let spaces = self
            .settings
            .get(JSON_SPACES_SETTING)
            .and_then(Value::as_u64)
            .map(|spaces| spaces.min(MAX_JSON_SPACES))
            .unwrap_or(0);

        let body = if spaces > 0 {
            let indent = " ".repeat(spaces as usize);
            let mut buffer = Vec::new();
            let mut serializer = serde_json::Serializer::with_formatter(
                &mut buffer,
                PrettyFormatter::with_indent(indent.as_bytes()),
            );
            value
                .serialize(&mut serializer)
                .map_err(|e| GantryError::Handler(e.to_string()))?;
            buffer
        } else {
            serde_json::to_vec(value).map_err(|e| GantryError::Handler(e.to_string()))?
        };

        self.write(Bytes::from(body), Some("application/json; charset=utf-8"))
    }

    /// Renders `template` with `data` through the app's view engine and
    /// sends the markup.
    pub fn render(&self, template: &str, data: &Value) -> Result<(), GantryError> {
        if self.headers_sent() {
            return Err(GantryError::HeadersSent);
        }

        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| GantryError::Render("No view engine configured".to_string()))?;

        let markup = engine.render(template, data, &self.settings)?;
        self.write(Bytes::from(markup), Some("text/html; charset=utf-8"))
    }

    /// Runs the formatter matching the request's `Accept` header.
    ///
    /// Sets `Content-Type` to the chosen format and adds `Accept` to `Vary`.
    /// Fails with `NotAcceptable` when nothing matches and no fallback is
    /// registered.
    pub fn format(&self, formats: Formats<'_>) -> Result<(), GantryError> {
        let Formats { entries, fallback } = formats;
        let offers: Vec<Mime> = entries
            .iter()
            .map(|(mime, _)| mime.clone())
            .collect();

        self.append_header(header::VARY, HeaderValue::from_static("Accept"));

        let chosen = negotiate(self.accept.as_deref(), &offers);
        match chosen {
            Some(index) => {
                let Some((mime, formatter)) = entries
                    .into_iter()
                    .nth(index)
                else {
                    return Err(GantryError::NotAcceptable);
                };
                let content_type = content_type_for(&mime);
                if let Ok(value) = HeaderValue::from_str(&content_type) {
                    self.set_header(header::CONTENT_TYPE, value);
                }
                formatter(self)
            }
            None => match fallback {
                Some(formatter) => formatter(self),
                None => Err(GantryError::NotAcceptable),
            },
        }
    }

    fn write(&self, body: Bytes, content_type: Option<&'static str>) -> Result<(), GantryError> {
        let mut state = self.state();
        if state.sent {
            return Err(GantryError::HeadersSent);
        }

        if let Some(content_type) = content_type {
            if !state
                .headers
                .contains_key(header::CONTENT_TYPE)
            {
                state
                    .headers
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
        }

        if state.status == StatusCode::NO_CONTENT || state.status == StatusCode::NOT_MODIFIED {
            strip_entity_headers(&mut state.headers);
            state.body = Bytes::new();
        } else if self.head {
            state
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
            state.body = Bytes::new();
        } else {
            state.body = body;
        }

        state.sent = true;
        Ok(())
    }

    /// Marks the response as sent without a body if no layer sent it.
    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut state = self.state();
        state.sent = true;

        let mut response = http::Response::new(Full::new(std::mem::take(&mut state.body)));
        *response.status_mut() = state.status;
        *response.headers_mut() = std::mem::take(&mut state.headers);
        response
    }
}

fn content_type_for(mime: &Mime) -> String {
    if mime
        .get_param(mime::CHARSET)
        .is_some()
    {
        return mime.to_string();
    }

    let textual = mime.type_() == mime::TEXT || mime.subtype() == mime::JSON;
    if textual {
        format!("{}; charset=utf-8", mime)
    } else {
        mime.to_string()
    }
}

fn strip_entity_headers(headers: &mut HeaderMap) {
    let entity: [HeaderName; 3] =
        [header::CONTENT_TYPE, header::CONTENT_LENGTH, header::TRANSFER_ENCODING];
    for name in entity {
        headers.remove(name);
    }
}
