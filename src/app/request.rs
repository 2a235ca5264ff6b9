use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use http::{request::Parts, HeaderMap, Method, Uri};

use crate::app::route::Params;

/// Incoming request as seen by middleware and route handlers.
///
/// The request is a cheap handle: cloning it shares the parsed head and the
/// collected body. Each layer receives a copy carrying the parameters its
/// own pattern captured.
///
/// # Examples
///
/// ```rust,ignore
/// use gantry::strategy::route_fn;
///
/// let handler = route_fn(|request, response| async move {
///     let id = request.param("id").unwrap_or("none");
///     let page = request.query("page");
///     // ...
///     Ok(())
/// });
/// ```
#[derive(Clone, Debug)]
pub struct Request {
    parts: Arc<Parts>,
    body: Bytes,
    params: Params,
}

impl Request {
    /// Creates a `Request` from a request head and its collected body.
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self { parts: Arc::new(parts), body, params: Arc::new(HashMap::new()) }
    }

    /// Creates a `Request` from an `http::Request` with a collected body.
    pub fn from_http(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts, body)
    }

    pub(crate) fn with_params(&self, params: Params) -> Self {
        Self { parts: self.parts.clone(), body: self.body.clone(), params }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Returns the path component of the request URI.
    pub fn path(&self) -> &str {
        self.parts
            .uri
            .path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Returns a header value as text, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts
            .headers
            .get(name)
            .and_then(|value| {
                value
                    .to_str()
                    .ok()
            })
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the parameters captured by the route that is handling the
    /// request.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .map(String::as_str)
    }

    /// Returns the decoded query string pairs in order of appearance.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match self
            .parts
            .uri
            .query()
        {
            Some(query) => url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Returns the first decoded value of a query string key.
    pub fn query(&self, key: &str) -> Option<String> {
        self.query_pairs()
            .into_iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Deserializes the body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(&self.body)
    }
}
