//! Error type shared by every layer of the driver.
//!
//! # Design
//! Failures are a single `Error` value carrying a closed `ErrorKind` tag plus
//! an optional server message. The response decoder is the only place that
//! classifies server failures; everything else propagates the value untouched
//! or matches on `kind()` to soften a specific case.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid arguments, rejected before any network I/O.
    MalformedRequest,
    /// The HTTP transport itself failed (connection refused, timeout, ...).
    Transport,
    /// Non-JSON content type or an unparsable JSON body.
    JsonFormat,
    /// HTTP 400 without a usable structured body.
    BadRequestSyntax,
    DocumentNotFound,
    CollectionNotFound,
    IndexNotFound,
    /// 404 for a path outside the document/collection/index families.
    ResourceNotFound,
    /// 4xx with a structured body, or any unstructured failure.
    ClientError,
    /// 5xx with a structured body.
    ServerError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedRequest => "malformed request",
            ErrorKind::Transport => "transport error",
            ErrorKind::JsonFormat => "JSON format error",
            ErrorKind::BadRequestSyntax => "bad request syntax",
            ErrorKind::DocumentNotFound => "document not found",
            ErrorKind::CollectionNotFound => "collection not found",
            ErrorKind::IndexNotFound => "index not found",
            ErrorKind::ResourceNotFound => "resource not found",
            ErrorKind::ClientError => "client error",
            ErrorKind::ServerError => "server error",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ErrorKind::DocumentNotFound
                | ErrorKind::CollectionNotFound
                | ErrorKind::IndexNotFound
                | ErrorKind::ResourceNotFound
        )
    }
}

/// A failed driver operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render(.kind, .status, .message))]
pub struct Error {
    kind: ErrorKind,
    status: Option<u16>,
    message: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            status: None,
            message: None,
        }
    }

    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind).message(message)
    }

    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::MalformedRequest, message)
    }

    pub fn json_format(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::JsonFormat, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::Transport, message)
    }

    pub(crate) fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub(crate) fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP status of the response that produced this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        self.status
    }

    /// The explicit message, without falling back to the kind's default text.
    pub fn server_message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind.is_not_found()
    }
}

fn render(kind: &ErrorKind, status: &Option<u16>, message: &Option<String>) -> String {
    if let Some(message) = message {
        return message.clone();
    }
    match kind {
        ErrorKind::DocumentNotFound => not_found("Document"),
        ErrorKind::CollectionNotFound => not_found("Collection"),
        ErrorKind::IndexNotFound => not_found("Index"),
        ErrorKind::ResourceNotFound => not_found("Resource"),
        ErrorKind::BadRequestSyntax => "Status 400: The syntax of the request was bad".to_string(),
        ErrorKind::ClientError | ErrorKind::ServerError => {
            let status = status.unwrap_or(match kind {
                ErrorKind::ServerError => 500,
                _ => 400,
            });
            let reason = ureq::http::StatusCode::from_u16(status)
                .ok()
                .and_then(|code| code.canonical_reason())
                .unwrap_or("Unknown Status");
            format!("{status} {reason}")
        }
        ErrorKind::MalformedRequest | ErrorKind::Transport | ErrorKind::JsonFormat => {
            kind.as_str().to_string()
        }
    }
}

fn not_found(what: &str) -> String {
    format!("The {what} you requested was not found on the server")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_message_wins() {
        let err = Error::with_message(ErrorKind::ServerError, "1200: conflict").status(503);
        assert_eq!(err.to_string(), "1200: conflict");
        assert_eq!(err.http_status(), Some(503));
    }

    #[test]
    fn not_found_defaults() {
        assert_eq!(
            Error::new(ErrorKind::ResourceNotFound).to_string(),
            "The Resource you requested was not found on the server"
        );
        assert_eq!(
            Error::new(ErrorKind::DocumentNotFound).to_string(),
            "The Document you requested was not found on the server"
        );
        assert!(Error::new(ErrorKind::IndexNotFound).is_not_found());
        assert!(!Error::new(ErrorKind::ClientError).is_not_found());
    }

    #[test]
    fn client_error_default_uses_status_reason() {
        assert_eq!(Error::new(ErrorKind::ClientError).to_string(), "400 Bad Request");
        assert_eq!(
            Error::new(ErrorKind::ClientError).status(409).to_string(),
            "409 Conflict"
        );
        assert_eq!(
            Error::new(ErrorKind::ClientError).status(502).to_string(),
            "502 Bad Gateway"
        );
    }

    #[test]
    fn bad_request_syntax_has_no_server_message() {
        let err = Error::new(ErrorKind::BadRequestSyntax).status(400);
        assert!(err.server_message().is_none());
        assert_eq!(err.to_string(), "Status 400: The syntax of the request was bad");
    }
}
