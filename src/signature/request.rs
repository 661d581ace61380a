use crate::error::{FrameworkError, Result, ValidationIssue};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::schema::SchemaType;
use http::request::Parts;
use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::debug;

/// Parameters held inline before spilling to the heap
pub const MAX_INLINE_PARAMS: usize = 8;

/// Headers held inline before spilling to the heap
pub const MAX_INLINE_HEADERS: usize = 16;

/// Name/value pairs in arrival order. Names repeat for repeated query keys.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Header and cookie pairs; header names are lowercase.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Transport-neutral view of an incoming request.
///
/// The host server owns routing, so path parameters are attached with
/// [`RequestData::with_path_params`] after matching.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestData {
    pub request_id: RequestId,
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    /// Request body parsed as JSON (if present)
    pub body: Option<Value>,
}

impl RequestData {
    /// Build from request head parts and the raw body.
    ///
    /// # Errors
    ///
    /// A non-empty body that is not valid JSON is a validation error.
    pub fn from_parts(parts: &Parts, body: &[u8]) -> Result<Self> {
        let headers: HeaderVec = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    Arc::from(name.as_str()),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let cookies = parse_cookies(&headers);
        let query_params = parts
            .uri
            .query()
            .map(parse_query_params)
            .unwrap_or_default();
        let request_id = RequestId::from_header_or_new(
            headers
                .iter()
                .find(|(k, _)| k.as_ref() == REQUEST_ID_HEADER)
                .map(|(_, v)| v.as_str()),
        );

        let body = if body.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            match serde_json::from_slice(body) {
                Ok(json) => Some(json),
                Err(e) => {
                    debug!(request_id = %request_id, error = %e, "JSON body parse failed");
                    return Err(FrameworkError::validation(vec![ValidationIssue::new(
                        "body",
                        format!("invalid JSON: {e}"),
                    )]));
                }
            }
        };

        debug!(
            request_id = %request_id,
            method = %parts.method,
            path = parts.uri.path(),
            header_count = headers.len(),
            cookie_count = cookies.len(),
            query_count = query_params.len(),
            has_body = body.is_some(),
            "Request data parsed"
        );

        Ok(RequestData {
            request_id,
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            path_params: ParamVec::new(),
            query_params,
            headers,
            cookies,
            body,
        })
    }

    #[must_use]
    pub fn with_path_params(mut self, params: ParamVec) -> Self {
        self.path_params = params;
        self
    }

    /// Path parameter by name; the last occurrence wins.
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        last(&self.path_params, name)
    }

    /// Query parameter by name; the last occurrence wins.
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        last(&self.query_params, name)
    }

    /// Every occurrence of a repeated query parameter, in order.
    pub fn get_query_params<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.query_params
            .iter()
            .filter(move |(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Header by case-insensitive name.
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        last(&self.cookies, name)
    }
}

fn last<'a>(params: &'a [(Arc<str>, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .rev()
        .find(|(k, _)| k.as_ref() == name)
        .map(|(_, v)| v.as_str())
}

/// Cookies from every `cookie` header.
#[must_use]
pub fn parse_cookies(headers: &[(Arc<str>, String)]) -> HeaderVec {
    headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("cookie"))
        .flat_map(|(_, c)| c.split(';'))
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim();
            Some((Arc::from(name), value.to_string()))
        })
        .collect()
}

/// URL-decoded pairs of a query string (without the leading `?`).
#[must_use]
pub fn parse_query_params(query: &str) -> ParamVec {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect()
}

/// Convert raw string parameter values to JSON according to the target type.
///
/// Several raw values (a repeated query key) or one comma separated value
/// become an array when the type is an array. Values that do not parse are
/// kept as strings so validation can report them.
#[must_use]
pub fn decode_param_value(raw: &[&str], ty: &SchemaType) -> Value {
    fn convert_primitive(val: &str, ty: &SchemaType) -> Value {
        match ty {
            SchemaType::Integer => val
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(val.to_string())),
            SchemaType::Number => val
                .parse::<f64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(val.to_string())),
            SchemaType::Boolean => match val.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Value::Bool(true),
                "false" | "0" | "no" | "off" => Value::Bool(false),
                _ => Value::String(val.to_string()),
            },
            SchemaType::Model(_) | SchemaType::Any => {
                serde_json::from_str(val).unwrap_or_else(|_| Value::String(val.to_string()))
            }
            _ => Value::String(val.to_string()),
        }
    }

    match ty {
        SchemaType::Array(item) => {
            let parts: Vec<&str> = if raw.len() == 1 {
                raw[0].split(',').filter(|s| !s.is_empty()).collect()
            } else {
                raw.to_vec()
            };
            Value::Array(
                parts
                    .into_iter()
                    .map(|p| convert_primitive(p.trim(), item))
                    .collect(),
            )
        }
        _ => match raw.last() {
            Some(val) => convert_primitive(val, ty),
            None => Value::Null,
        },
    }
}
