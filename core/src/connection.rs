//! The connection: request building, transport, logging and decoding.
//!
//! # Design
//! `Connection::send_request` is the one entry point every higher layer uses.
//! It builds the request, logs it, hands it to the owned transport, logs the
//! raw response and decodes it. The server address is fixed at construction;
//! credentials can be attached once afterwards and then ride on every
//! request. There is no internal locking: `authenticate_with` takes
//! `&mut self`, so it cannot race with in-flight requests.

use std::fmt;
use std::sync::Arc;

use tracing::Level;
use url::Url;

use crate::config::ConnectionConfig;
use crate::cursor::{Cursor, CursorRequest};
use crate::decoder::{decode_response, DecodedResponse};
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::logger::Logger;
use crate::request::{Credentials, Operation, RequestBuilder, DEFAULT_API_ROOT};
use crate::transport::{Transport, UreqTransport};

/// A synchronous connection to one database server.
pub struct Connection {
    scheme: String,
    host: String,
    port: u16,
    requests: RequestBuilder,
    credentials: Option<Credentials>,
    logger: Option<Arc<dyn Logger>>,
    transport: Box<dyn Transport>,
}

impl Connection {
    /// Connect to `url` using the default API root and a ureq transport.
    pub fn new(url: &str) -> Result<Self> {
        Self::build(url, DEFAULT_API_ROOT, Box::new(UreqTransport::new()))
    }

    /// Build a connection from `config`. Credentials in the config go through
    /// `authenticate_with`, so a half-filled pair is rejected.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        let mut transport = UreqTransport::with_timeout(config.timeout);
        if let Some(limit) = config.max_response_bytes {
            transport = transport.with_max_response_bytes(limit);
        }
        let mut connection = Self::build(&config.url, &config.api_root, Box::new(transport))?;
        if config.username.is_some() || config.password.is_some() {
            connection.authenticate_with(config.username.as_deref(), config.password.as_deref())?;
        }
        Ok(connection)
    }

    fn build(url: &str, api_root: &str, transport: Box<dyn Transport>) -> Result<Self> {
        let parsed =
            Url::parse(url).map_err(|e| Error::malformed_request(format!("invalid server URL {url:?}: {e}")))?;
        let scheme = parsed.scheme().to_string();
        if scheme != "http" && scheme != "https" {
            return Err(Error::malformed_request(format!(
                "unsupported URL scheme {scheme:?}, expected http or https"
            )));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::malformed_request(format!("server URL {url:?} has no host")))?
            .to_string();
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| Error::malformed_request(format!("server URL {url:?} has no port")))?;
        let base_url = format!("{scheme}://{host}:{port}{}", parsed.path().trim_end_matches('/'));

        Ok(Self {
            scheme,
            host,
            port,
            requests: RequestBuilder::new(&base_url, api_root),
            credentials: None,
            logger: None,
            transport,
        })
    }

    /// Replace the HTTP transport.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    /// Attach a logger that receives one line per request and per response.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> &str {
        self.requests.base_url()
    }

    /// Absolute URL the logical `path` is sent to.
    pub fn url_for(&self, path: &str) -> String {
        self.requests.url_for(path)
    }

    /// Use HTTP Basic authentication for every later request.
    ///
    /// Both values are required. Credentials can be set only once per
    /// connection; a second call is rejected. Returns `self` for chaining.
    pub fn authenticate_with(&mut self, username: Option<&str>, password: Option<&str>) -> Result<&mut Self> {
        let (username, password) = match (username, password) {
            (Some(username), Some(password)) => (username, password),
            _ => {
                return Err(Error::malformed_request(
                    "authentication requires both a username and a password",
                ))
            }
        };
        if self.credentials.is_some() {
            return Err(Error::malformed_request(
                "credentials are already set for this connection",
            ));
        }
        self.credentials = Some(Credentials::new(username, password));
        Ok(self)
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// Send `operation` to the logical `path` and decode the response.
    ///
    /// Any non-2xx status, non-JSON content type or unparsable body is an
    /// `Error`; a successful call always returns the server's JSON object.
    pub fn send_request(&self, path: &str, operation: Operation) -> Result<DecodedResponse> {
        let request = self.requests.build(path, &operation, self.credentials.as_ref())?;
        self.log_request(&request);
        let response = self.transport.execute(&request)?;
        self.log_response(&response);
        decode_response(path, &response)
    }

    /// Submit a query and wrap the first page of results in a `Cursor`.
    pub fn query(&self, request: &CursorRequest) -> Result<Cursor<'_>> {
        let first = self.send_request("cursor", Operation::post_json(request)?)?;
        Cursor::new(self, first)
    }

    fn log_request(&self, request: &HttpRequest) {
        if let Some(logger) = &self.logger {
            let line = match &request.body {
                Some(body) => format!("{} {} {body}", request.method, request.url),
                None => format!("{} {}", request.method, request.url),
            };
            logger.log(Level::INFO, &line);
        }
    }

    fn log_response(&self, response: &HttpResponse) {
        if let Some(logger) = &self.logger {
            logger.log(Level::INFO, &format!("{} {}", response.status, response.body));
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.base_url())
            .field("credentials", &self.credentials)
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}
