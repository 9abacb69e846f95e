//! In-memory imitation of the document database's HTTP API.
//!
//! Implements the slice of `/_api` the driver talks to: collections,
//! documents and paginated query cursors. Queries are limited to
//! `FOR <var> IN <collection> RETURN <var>`. Failures use the server's JSON
//! error shape so the driver's decoder sees realistic bodies.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Batch size used when a query does not ask for one.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Default)]
pub struct Store {
    collections: HashMap<String, Vec<Value>>,
    cursors: HashMap<String, ServerCursor>,
    next_cursor_id: u64,
}

struct ServerCursor {
    remaining: VecDeque<Value>,
    batch_size: usize,
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Clone)]
pub struct AppState {
    db: Db,
    credentials: Option<Arc<(String, String)>>,
}

/// A failed request, rendered as `{error, code, errorNum, errorMessage}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error_num: u32,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, error_num: u32, message: impl Into<String>) -> Self {
        Self {
            status,
            error_num,
            message: message.into(),
        }
    }

    fn collection_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, 1203, "collection or view not found")
    }

    fn document_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, 1202, "document not found")
    }

    fn cursor_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, 1600, "cursor not found")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": true,
            "code": self.status.as_u16(),
            "errorNum": self.error_num,
            "errorMessage": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult = Result<(StatusCode, Json<Value>), ApiError>;

pub fn app() -> Router {
    router(None)
}

/// Like `app`, but every request must carry HTTP Basic credentials.
pub fn app_with_credentials(username: &str, password: &str) -> Router {
    router(Some((username.to_string(), password.to_string())))
}

fn router(credentials: Option<(String, String)>) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Store::default())),
        credentials: credentials.map(Arc::new),
    };
    Router::new()
        .route("/_api/version", get(version))
        .route("/_api/collection", post(create_collection))
        .route("/_api/collection/{name}", get(get_collection).delete(delete_collection))
        .route("/_api/document/{collection}", post(create_document))
        .route(
            "/_api/document/{collection}/{key}",
            get(get_document).delete(delete_document),
        )
        .route("/_api/cursor", post(create_cursor))
        .route("/_api/cursor/{id}", put(next_batch).delete(delete_cursor))
        .fallback(unknown_path)
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_credentials(
    listener: TcpListener,
    username: &str,
    password: &str,
) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_credentials(username, password)).await
}

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = &state.credentials else {
        return next.run(request).await;
    };
    let supplied = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
        .and_then(|token| STANDARD.decode(token).ok())
        .and_then(|raw| String::from_utf8(raw).ok());
    let expected_pair = format!("{}:{}", expected.0, expected.1);
    if supplied.as_deref() == Some(expected_pair.as_str()) {
        return next.run(request).await;
    }
    tracing::debug!("rejecting unauthenticated request to {}", request.uri());
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        11,
        "not authorized to execute this request",
    )
    .into_response()
}

async fn unknown_path(uri: Uri) -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        404,
        format!("unknown path '{}'", uri.path()),
    )
}

async fn version() -> Json<Value> {
    Json(json!({"server": "mock", "version": env!("CARGO_PKG_VERSION")}))
}

fn parse_body(body: &Bytes) -> Result<Map<String, Value>, ApiError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            600,
            "expecting a JSON object as body",
        )),
        Err(_) => Err(ApiError::new(StatusCode::BAD_REQUEST, 600, "invalid JSON")),
    }
}

// --- collections ---

async fn create_collection(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let body = parse_body(&body)?;
    let name = body
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, 1208, "illegal name"))?
        .to_string();

    let mut store = state.db.write().await;
    if store.collections.contains_key(&name) {
        return Err(ApiError::new(StatusCode::CONFLICT, 1207, "duplicate name"));
    }
    store.collections.insert(name.clone(), Vec::new());
    tracing::debug!("created collection {name}");
    Ok((StatusCode::OK, Json(collection_info(&name, 0))))
}

async fn get_collection(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult {
    let store = state.db.read().await;
    let documents = store
        .collections
        .get(&name)
        .ok_or_else(ApiError::collection_not_found)?;
    Ok((StatusCode::OK, Json(collection_info(&name, documents.len()))))
}

async fn delete_collection(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult {
    let mut store = state.db.write().await;
    store
        .collections
        .remove(&name)
        .ok_or_else(ApiError::collection_not_found)?;
    Ok((StatusCode::OK, Json(json!({"id": name, "error": false, "code": 200}))))
}

fn collection_info(name: &str, count: usize) -> Value {
    json!({
        "id": name,
        "name": name,
        "type": 2,
        "status": 3,
        "count": count,
        "error": false,
        "code": 200,
    })
}

// --- documents ---

async fn create_document(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    body: Bytes,
) -> ApiResult {
    let mut document = parse_body(&body)?;
    let mut store = state.db.write().await;
    let documents = store
        .collections
        .get_mut(&collection)
        .ok_or_else(ApiError::collection_not_found)?;

    let key = match document.get("_key").and_then(Value::as_str) {
        Some(key) => key.to_string(),
        None => Uuid::new_v4().simple().to_string(),
    };
    if documents.iter().any(|doc| doc["_key"] == key.as_str()) {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            1210,
            "unique constraint violated",
        ));
    }
    let id = format!("{collection}/{key}");
    let rev = Uuid::new_v4().simple().to_string();
    document.insert("_key".to_string(), json!(key));
    document.insert("_id".to_string(), json!(id));
    document.insert("_rev".to_string(), json!(rev));
    documents.push(Value::Object(document));

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"_id": id, "_key": key, "_rev": rev})),
    ))
}

async fn get_document(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
) -> ApiResult {
    let store = state.db.read().await;
    let documents = store
        .collections
        .get(&collection)
        .ok_or_else(ApiError::collection_not_found)?;
    let document = documents
        .iter()
        .find(|doc| doc["_key"] == key.as_str())
        .ok_or_else(ApiError::document_not_found)?;
    Ok((StatusCode::OK, Json(document.clone())))
}

async fn delete_document(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
) -> ApiResult {
    let mut store = state.db.write().await;
    let documents = store
        .collections
        .get_mut(&collection)
        .ok_or_else(ApiError::collection_not_found)?;
    let position = documents
        .iter()
        .position(|doc| doc["_key"] == key.as_str())
        .ok_or_else(ApiError::document_not_found)?;
    let removed = documents.remove(position);
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"_id": removed["_id"], "_key": removed["_key"], "_rev": removed["_rev"]})),
    ))
}

// --- cursors ---

/// Extract the collection name from `FOR <var> IN <collection> RETURN <var>`.
pub fn parse_query(query: &str) -> Option<&str> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    match tokens.as_slice() {
        [for_kw, var, in_kw, collection, return_kw, returned]
            if for_kw.eq_ignore_ascii_case("FOR")
                && in_kw.eq_ignore_ascii_case("IN")
                && return_kw.eq_ignore_ascii_case("RETURN")
                && var == returned =>
        {
            Some(*collection)
        }
        _ => None,
    }
}

async fn create_cursor(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let body = parse_body(&body)?;
    let query = body
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, 10, "query is empty"))?;
    let collection = parse_query(query).ok_or_else(|| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            1501,
            format!("syntax error, unexpected query '{query}'"),
        )
    })?;
    let batch_size = body
        .get("batchSize")
        .and_then(Value::as_u64)
        .map(|size| size as usize)
        .unwrap_or(DEFAULT_BATCH_SIZE);
    if batch_size == 0 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            10,
            "batchSize must be positive",
        ));
    }
    let with_count = body.get("count").and_then(Value::as_bool).unwrap_or(false);

    let mut store = state.db.write().await;
    let mut remaining: VecDeque<Value> = store
        .collections
        .get(collection)
        .ok_or_else(ApiError::collection_not_found)?
        .iter()
        .cloned()
        .collect();
    let total = remaining.len();
    let batch: Vec<Value> = take_batch(&mut remaining, batch_size);

    let mut response = json!({
        "result": batch,
        "hasMore": !remaining.is_empty(),
        "error": false,
        "code": 201,
    });
    if with_count {
        response["count"] = json!(total);
    }
    if !remaining.is_empty() {
        store.next_cursor_id += 1;
        let id = store.next_cursor_id.to_string();
        tracing::debug!("opened cursor {id} with {} pending records", remaining.len());
        store.cursors.insert(
            id.clone(),
            ServerCursor {
                remaining,
                batch_size,
            },
        );
        response["id"] = json!(id);
    }
    Ok((StatusCode::CREATED, Json(response)))
}

async fn next_batch(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let mut store = state.db.write().await;
    let cursor = store
        .cursors
        .get_mut(&id)
        .ok_or_else(ApiError::cursor_not_found)?;
    let batch_size = cursor.batch_size;
    let batch = take_batch(&mut cursor.remaining, batch_size);
    let has_more = !cursor.remaining.is_empty();
    if !has_more {
        store.cursors.remove(&id);
    }
    Ok((
        StatusCode::OK,
        Json(json!({
            "result": batch,
            "hasMore": has_more,
            "id": id,
            "error": false,
            "code": 200,
        })),
    ))
}

async fn delete_cursor(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let mut store = state.db.write().await;
    store
        .cursors
        .remove(&id)
        .ok_or_else(ApiError::cursor_not_found)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"id": id, "error": false, "code": 202})),
    ))
}

fn take_batch(remaining: &mut VecDeque<Value>, batch_size: usize) -> Vec<Value> {
    let take = batch_size.min(remaining.len());
    remaining.drain(..take).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_collection_queries() {
        assert_eq!(parse_query("FOR u IN users RETURN u"), Some("users"));
        assert_eq!(parse_query("for  doc in\nedges return doc"), Some("edges"));
    }

    #[test]
    fn rejects_other_queries() {
        assert_eq!(parse_query("FOR u IN users RETURN v"), None);
        assert_eq!(parse_query("RETURN 1"), None);
        assert_eq!(parse_query("FOR u IN users FILTER u.a RETURN u"), None);
    }

    #[test]
    fn take_batch_stops_at_end() {
        let mut remaining: VecDeque<Value> = (1..=3).map(|n| json!(n)).collect();
        assert_eq!(take_batch(&mut remaining, 2), vec![json!(1), json!(2)]);
        assert_eq!(take_batch(&mut remaining, 2), vec![json!(3)]);
        assert!(take_batch(&mut remaining, 2).is_empty());
    }

    #[test]
    fn api_error_renders_server_shape() {
        let err = ApiError::document_not_found();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.error_num, 1202);
    }
}
