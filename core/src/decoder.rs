//! Response decoding and failure classification.
//!
//! # Design
//! `decode_response` is the single place where a raw `HttpResponse` becomes
//! either a decoded JSON object or a typed `Error`. The decision order is:
//! content type, then JSON parse, then status. Not-found failures are
//! classified by the leading segment of the *request* path, never by the
//! body, because the server's 404 bodies do not say what was missing.

use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind, Result};
use crate::http::HttpResponse;

/// Successful response body: the server's JSON object, unchanged.
pub type DecodedResponse = Map<String, Value>;

/// Decode `response` to the request made against logical `path`.
pub fn decode_response(path: &str, response: &HttpResponse) -> Result<DecodedResponse> {
    if !response.is_json() {
        return Err(Error::json_format(format!(
            "expected a JSON response, got content type {}",
            response.content_type().unwrap_or("<none>")
        ))
        .status(response.status));
    }

    let parsed = serde_json::from_str::<Value>(&response.body);

    if response.is_success() {
        return match parsed {
            Ok(Value::Object(object)) => Ok(object),
            Ok(other) => Err(Error::json_format(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            ))
            .status(response.status)),
            Err(e) => Err(Error::json_format(format!("invalid JSON body: {e}")).status(response.status)),
        };
    }

    let structured = match &parsed {
        Ok(body) => structured_error(body),
        Err(_) => None,
    };

    match response.status {
        400 if structured.is_none() => Err(Error::new(ErrorKind::BadRequestSyntax).status(400)),
        404 => Err(Error::new(not_found_kind(path)).status(404)),
        _ if parsed.is_err() => Err(Error::json_format(format!(
            "invalid JSON body in {} response",
            response.status
        ))
        .status(response.status)),
        status => {
            let kind = if (500..600).contains(&status) && structured.is_some() {
                ErrorKind::ServerError
            } else {
                ErrorKind::ClientError
            };
            let err = Error::new(kind).status(status);
            Err(match structured {
                Some(message) => err.message(message),
                None => err,
            })
        }
    }
}

/// `"<errorNum>: <errorMessage>"` when both fields are present.
fn structured_error(body: &Value) -> Option<String> {
    let num = body.get("errorNum")?;
    let message = body.get("errorMessage")?.as_str()?;
    let num = match num {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };
    Some(format!("{num}: {message}"))
}

fn not_found_kind(path: &str) -> ErrorKind {
    let segment = path
        .trim_start_matches('/')
        .split(['/', '?'])
        .next()
        .unwrap_or_default();
    match segment {
        "document" => ErrorKind::DocumentNotFound,
        "collection" => ErrorKind::CollectionNotFound,
        "index" => ErrorKind::IndexNotFound,
        _ => ErrorKind::ResourceNotFound,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![(
                "content-type".to_string(),
                "application/json; charset=utf-8".to_string(),
            )],
            body: body.to_string(),
        }
    }

    #[test]
    fn success_returns_object_untouched() {
        let res = json_response(200, r#"{"_key":"333","nested":{"a":[1,2]},"camelCase":true}"#);
        let decoded = decode_response("document/4590/333", &res).unwrap();
        assert_eq!(decoded["_key"], "333");
        assert_eq!(decoded["nested"]["a"][1], 2);
        assert_eq!(decoded["camelCase"], true);
    }

    #[test]
    fn non_json_content_type_fails_even_on_200() {
        let mut res = json_response(200, r#"{"ok":true}"#);
        res.headers = vec![("content-type".to_string(), "text/html".to_string())];
        let err = decode_response("version", &res).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JsonFormat);
    }

    #[test]
    fn missing_content_type_fails_on_404() {
        let mut res = json_response(404, "");
        res.headers.clear();
        let err = decode_response("document/1/2", &res).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JsonFormat);
    }

    #[test]
    fn unparsable_success_body_is_json_format_error() {
        let err = decode_response("version", &json_response(200, "{not json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JsonFormat);
    }

    #[test]
    fn success_with_array_body_is_rejected() {
        let err = decode_response("version", &json_response(200, "[1,2]")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JsonFormat);
    }

    #[test]
    fn empty_400_is_bad_request_syntax() {
        let err = decode_response("cursor", &json_response(400, "")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequestSyntax);
        assert!(err.server_message().is_none());
    }

    #[test]
    fn structured_400_is_client_error() {
        let body = r#"{"error":true,"code":400,"errorNum":1501,"errorMessage":"syntax error"}"#;
        let err = decode_response("cursor", &json_response(400, body)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientError);
        assert_eq!(err.to_string(), "1501: syntax error");
    }

    #[test]
    fn not_found_dispatches_on_path_segment() {
        let res = json_response(404, r#"{"error":true,"errorNum":1202,"errorMessage":"x"}"#);
        let kind = |path| decode_response(path, &res).unwrap_err().kind();
        assert_eq!(kind("document/4590/333"), ErrorKind::DocumentNotFound);
        assert_eq!(kind("collection/4590"), ErrorKind::CollectionNotFound);
        assert_eq!(kind("index/4590/12"), ErrorKind::IndexNotFound);
        assert_eq!(kind("document?collection=users"), ErrorKind::DocumentNotFound);
        assert_eq!(kind("documents/1"), ErrorKind::ResourceNotFound);
        assert_eq!(kind("unknown_path/4590/333"), ErrorKind::ResourceNotFound);
    }

    #[test]
    fn generic_not_found_uses_default_message() {
        let err = decode_response("unknown_path/4590/333", &json_response(404, "{}")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The Resource you requested was not found on the server"
        );
    }

    #[test]
    fn structured_4xx_and_5xx_render_identically() {
        let body = r#"{"error":true,"errorNum":1200,"errorMessage":"conflict"}"#;
        let client = decode_response("document/a/1", &json_response(409, body)).unwrap_err();
        let server = decode_response("document/a/1", &json_response(503, body)).unwrap_err();
        assert_eq!(client.kind(), ErrorKind::ClientError);
        assert_eq!(server.kind(), ErrorKind::ServerError);
        assert_eq!(client.to_string(), "1200: conflict");
        assert_eq!(server.to_string(), client.to_string());
    }

    #[test]
    fn unstructured_failure_is_client_error_with_default() {
        let err = decode_response("version", &json_response(500, r#"{"oops":1}"#)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientError);
        assert_eq!(err.to_string(), "500 Internal Server Error");
    }

    #[test]
    fn unparsable_failure_body_is_json_format_error() {
        let err = decode_response("version", &json_response(500, "<html>")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JsonFormat);
        assert_eq!(err.http_status(), Some(500));
    }
}
