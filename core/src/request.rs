//! Request construction.
//!
//! # Design
//! `RequestBuilder` knows the server's base URL and API root and turns a
//! logical path plus an `Operation` into an `HttpRequest`. Callers never
//! spell out the API root or a leading slash. An `Operation` holds at most one
//! body, so "one body-bearing operation per call" is enforced by the type.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest};

/// API root segment used when none is configured.
pub const DEFAULT_API_ROOT: &str = "_api";

/// Method and optional JSON body of a single request.
///
/// `Operation::default()` is a body-less GET.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operation {
    method: HttpMethod,
    body: Option<Value>,
}

impl Operation {
    pub fn new(method: HttpMethod) -> Self {
        Self { method, body: None }
    }

    pub fn get() -> Self {
        Self::new(HttpMethod::Get)
    }

    pub fn delete() -> Self {
        Self::new(HttpMethod::Delete)
    }

    pub fn post(body: Value) -> Self {
        Self::new(HttpMethod::Post).with_body(body)
    }

    pub fn put(body: Value) -> Self {
        Self::new(HttpMethod::Put).with_body(body)
    }

    /// Serialize `body` and attach it to a POST.
    pub fn post_json<T: Serialize>(body: &T) -> Result<Self> {
        Ok(Self::post(to_value(body)?))
    }

    /// Serialize `body` and attach it to a PUT.
    pub fn put_json<T: Serialize>(body: &T) -> Result<Self> {
        Ok(Self::put(to_value(body)?))
    }

    /// Attach a body, replacing any previous one.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

fn to_value<T: Serialize>(body: &T) -> Result<Value> {
    serde_json::to_value(body)
        .map_err(|e| Error::malformed_request(format!("request body is not serializable: {e}")))
}

/// Username and password sent as HTTP Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn authorization_header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Builds `HttpRequest` values for one server.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: String,
    api_root: String,
}

impl RequestBuilder {
    pub fn new(base_url: &str, api_root: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_root: api_root.trim_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of a logical path such as `document/users/42`.
    pub fn url_for(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if self.api_root.is_empty() {
            format!("{}/{path}", self.base_url)
        } else {
            format!("{}/{}/{path}", self.base_url, self.api_root)
        }
    }

    pub fn build(
        &self,
        path: &str,
        operation: &Operation,
        credentials: Option<&Credentials>,
    ) -> Result<HttpRequest> {
        let mut headers = Vec::new();
        if let Some(credentials) = credentials {
            headers.push(("authorization".to_string(), credentials.authorization_header()));
        }

        let body = match operation.body() {
            Some(value) => {
                let body = serde_json::to_string(value).map_err(|e| {
                    Error::malformed_request(format!("request body is not serializable: {e}"))
                })?;
                headers.push(("content-type".to_string(), "application/json".to_string()));
                Some(body)
            }
            None => None,
        };

        Ok(HttpRequest {
            method: operation.method(),
            url: self.url_for(path),
            headers,
            body,
        })
    }
}
