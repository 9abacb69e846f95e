//! Lazy iteration over server-side result sets.
//!
//! # Design
//! The server hands out results one page at a time. A `Cursor` holds exactly
//! one `Page` and drains its batch; when the batch is empty and the page said
//! `hasMore`, it issues one `PUT cursor/<id>` and replaces the page with the
//! next one. Fetching is strictly pull-based: nothing is requested until the
//! caller asks for a record past the end of the current batch.

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::connection::Connection;
use crate::decoder::DecodedResponse;
use crate::error::{Error, Result};
use crate::http::HttpMethod;
use crate::request::Operation;

const EDGE_FROM_KEY: &str = "_from";
const EDGE_TO_KEY: &str = "_to";

/// Body of a query submission (`POST cursor`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// Ask the server to report the total result count on the first page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<bool>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub bind_vars: Map<String, Value>,
}

impl CursorRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_count(mut self, count: bool) -> Self {
        self.count = Some(count);
        self
    }

    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bind_vars.insert(name.into(), value);
        self
    }
}

/// One server page: a batch of raw records plus continuation metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub id: Option<String>,
    pub batch: Vec<Value>,
    pub has_more: bool,
    /// Total result count, when the server reported one.
    pub length: Option<usize>,
}

impl Page {
    /// Normalise either the multi-result shape (`result`, `hasMore`, `id`,
    /// `count`) or the single-result shape (`document`).
    pub fn from_response(mut response: DecodedResponse) -> Result<Self> {
        if let Some(document) = response.remove("document") {
            if !document.is_object() {
                return Err(Error::json_format("cursor `document` field is not an object"));
            }
            return Ok(Self {
                id: None,
                batch: vec![document],
                has_more: false,
                length: Some(1),
            });
        }

        let batch = match response.remove("result") {
            Some(Value::Array(records)) => records,
            Some(_) => return Err(Error::json_format("cursor `result` field is not an array")),
            None => {
                return Err(Error::json_format(
                    "cursor response has neither `result` nor `document`",
                ))
            }
        };
        let has_more = response.get("hasMore").and_then(Value::as_bool).unwrap_or(false);
        let id = match response.get("id") {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };
        if has_more && id.is_none() {
            return Err(Error::json_format("cursor page has more results but no `id`"));
        }
        let length = response
            .get("count")
            .and_then(Value::as_u64)
            .and_then(|count| usize::try_from(count).ok());

        Ok(Self {
            id,
            batch,
            has_more,
            length,
        })
    }
}

/// A decoded record, classified once when it leaves the cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// An object carrying both `_from` and `_to`.
    Edge(Value),
    Plain(Value),
}

impl Record {
    pub fn classify(raw: Value) -> Self {
        let is_edge = raw
            .as_object()
            .is_some_and(|object| object.contains_key(EDGE_FROM_KEY) && object.contains_key(EDGE_TO_KEY));
        if is_edge {
            Record::Edge(raw)
        } else {
            Record::Plain(raw)
        }
    }

    pub fn is_edge(&self) -> bool {
        matches!(self, Record::Edge(_))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_value().get(key)
    }

    /// The record exactly as the server sent it.
    pub fn as_value(&self) -> &Value {
        match self {
            Record::Edge(value) | Record::Plain(value) => value,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Record::Edge(value) | Record::Plain(value) => value,
        }
    }
}

/// Single-pass iterator over a server-side result set.
///
/// Yields `Err` at most once, when a continuation request fails; the cursor
/// is inert afterwards.
#[derive(Debug)]
pub struct Cursor<'c> {
    connection: &'c Connection,
    id: Option<String>,
    has_more: bool,
    length: Option<usize>,
    buffer: VecDeque<Value>,
}

impl<'c> Cursor<'c> {
    /// Wrap the first response of a query or document submission.
    pub fn new(connection: &'c Connection, first: DecodedResponse) -> Result<Self> {
        let page = Page::from_response(first)?;
        let mut cursor = Self {
            connection,
            id: None,
            has_more: false,
            length: None,
            buffer: VecDeque::new(),
        };
        cursor.replace_page(page);
        Ok(cursor)
    }

    /// Server-assigned id; `None` when the whole result fit in the first page.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Total number of results, if the server reported it.
    pub fn length(&self) -> Option<usize> {
        self.length
    }

    /// Whether another round-trip would be made once the buffer is drained.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Release the server-side cursor.
    ///
    /// Each call sends one `DELETE cursor/<id>`. A cursor without a server id
    /// (a `document` response, or a result that fit in one page) holds no
    /// server state, so deleting it sends nothing and succeeds. Records
    /// already buffered can still be iterated, but no more pages are
    /// fetched. A cursor the server no longer knows counts as released.
    pub fn delete(&mut self) -> Result<()> {
        self.has_more = false;
        let Some(id) = &self.id else {
            return Ok(());
        };
        match self.connection.send_request(&format!("cursor/{id}"), Operation::delete()) {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn fetch_next_page(&self) -> Result<Page> {
        let Some(id) = &self.id else {
            return Err(Error::json_format("cannot continue a cursor without an id"));
        };
        let response = self
            .connection
            .send_request(&format!("cursor/{id}"), Operation::new(HttpMethod::Put))?;
        Page::from_response(response)
    }

    fn replace_page(&mut self, page: Page) {
        let Page {
            id,
            batch,
            has_more,
            length,
        } = page;
        if id.is_some() {
            self.id = id;
        }
        if length.is_some() {
            self.length = length;
        }
        self.has_more = has_more;
        self.buffer = batch.into();
    }
}

impl Iterator for Cursor<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(raw) = self.buffer.pop_front() {
                return Some(Ok(Record::classify(raw)));
            }
            if !self.has_more {
                return None;
            }
            match self.fetch_next_page() {
                Ok(page) => self.replace_page(page),
                Err(e) => {
                    self.has_more = false;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl std::iter::FusedIterator for Cursor<'_> {}
