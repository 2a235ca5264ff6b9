use std::{collections::HashMap, sync::Arc};

use http::Method;
use percent_encoding::percent_decode_str;

use crate::errors::{GantryError, RouteError};

/// Named path parameters captured by a route pattern.
pub type Params = Arc<HashMap<String, String>>;

/// Which request methods a route answers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MethodFilter {
    /// Every method (`all`)
    Any,
    /// A single method. `GET` routes also answer `HEAD`.
    Only(Method),
}

impl MethodFilter {
    /// Parses a method name case-insensitively. `all` selects every method.
    pub fn parse(method: &str) -> Result<MethodFilter, GantryError> {
        if method.eq_ignore_ascii_case("all") {
            return Ok(MethodFilter::Any);
        }

        let upper = method.to_ascii_uppercase();
        Method::from_bytes(upper.as_bytes())
            .map(MethodFilter::Only)
            .map_err(|_| RouteError::InvalidMethod(method.to_string()).into())
    }

    pub fn allows(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(expected) => {
                expected == method || (*expected == Method::GET && *method == Method::HEAD)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// An Express style path pattern: `/users/:id/files/*`.
///
/// Literal segments match case-insensitively, repeated and trailing slashes
/// are ignored, and `*` is only allowed as the last segment where it captures
/// the remainder of the path under the `*` key.
#[derive(Clone, Debug)]
pub struct RoutePattern {
    pattern: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<RoutePattern, GantryError> {
        if !pattern.starts_with('/') {
            return Err(RouteError::InvalidPath(format!("{} must start with /", pattern)).into());
        }

        let raw: Vec<&str> = pattern
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        let mut segments = Vec::with_capacity(raw.len());
        for (index, segment) in raw
            .iter()
            .enumerate()
        {
            if *segment == "*" {
                if index + 1 != raw.len() {
                    return Err(RouteError::InvalidPath(format!(
                        "{}: wildcard must be the last segment",
                        pattern
                    ))
                    .into());
                }
                segments.push(Segment::Wildcard);
            } else if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    return Err(RouteError::InvalidPath(format!(
                        "{}: parameter without a name",
                        pattern
                    ))
                    .into());
                }
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Literal(segment.to_ascii_lowercase()));
            }
        }

        Ok(RoutePattern { pattern: pattern.to_string(), segments })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Matches the whole path.
    pub fn matches(&self, path: &str) -> Option<Params> {
        self.match_path(path, false)
    }

    /// Matches when the pattern is a prefix of the path, on segment
    /// boundaries. Used for mounted middleware.
    pub fn matches_prefix(&self, path: &str) -> Option<Params> {
        self.match_path(path, true)
    }

    fn match_path(&self, path: &str, prefix: bool) -> Option<Params> {
        let parts: Vec<&str> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        let mut params = HashMap::new();
        let mut consumed = 0;

        for segment in &self.segments {
            match segment {
                Segment::Wildcard => {
                    params.insert("*".to_string(), decode(&parts[consumed..].join("/")));
                    return Some(Arc::new(params));
                }
                Segment::Literal(literal) => {
                    let part = parts.get(consumed)?;
                    if !part.eq_ignore_ascii_case(literal) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let part = parts.get(consumed)?;
                    params.insert(name.clone(), decode(part));
                }
            }
            consumed += 1;
        }

        if prefix || consumed == parts.len() {
            Some(Arc::new(params))
        } else {
            None
        }
    }
}

fn decode(segment: &str) -> String {
    percent_decode_str(segment)
        .decode_utf8_lossy()
        .into_owned()
}
