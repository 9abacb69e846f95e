//! Synchronous protocol core for a JSON-over-HTTP document database.
//!
//! # Overview
//! `Connection::send_request` turns a logical path plus an `Operation` into
//! an HTTP request, executes it through a pluggable `Transport`, and decodes
//! the reply into either the server's JSON object or a typed `Error`.
//! `Cursor` turns a paginated query result into a lazy iterator, fetching
//! continuation pages only when the caller runs past the current batch.
//!
//! # Design
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`);
//!   building and decoding are deterministic and tested without a network.
//! - `decode_response` is the only place server failures are classified.
//!   Every error is one `Error` value with a closed `ErrorKind`.
//! - Logging goes through an optional `Logger`; without one the core is silent.
//! - Everything blocks the calling thread. There is no background I/O.

pub mod config;
pub mod connection;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod http;
pub mod logger;
pub mod request;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::ConnectionConfig;
pub use connection::Connection;
pub use cursor::{Cursor, CursorRequest, Page, Record};
pub use decoder::{decode_response, DecodedResponse};
pub use error::{Error, ErrorKind, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use logger::{Logger, TracingLogger};
pub use request::{Credentials, Operation, RequestBuilder};
pub use transport::{Transport, UreqTransport};
