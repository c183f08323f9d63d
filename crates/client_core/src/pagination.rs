//! Response unwrapping and offset-page normalization.
//!
//! Offset endpoints answer with `{data, meta}`, optionally wrapped in a
//! `{success, data}` envelope, and a few legacy ones with a bare array. All of
//! them are normalized into [`PageResult`]. Cursor endpoints are decoded
//! straight into [`shared::protocol::CursorPage`] and never pass through here.

use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::protocol::PageMeta;
use tracing::warn;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> PageResult<T> {
    /// The page shown for anonymous (401) listings.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            meta: PageMeta::empty(),
        }
    }
}

/// Strips a `{success, data}` envelope.
///
/// A `data` array sitting next to `meta` is a bare paginated body, not an
/// envelope, and is returned untouched.
pub fn unwrap_envelope(payload: Value) -> ClientResult<Value> {
    match payload {
        Value::Null => Err(ClientError::EmptyBody),
        Value::Object(mut object) => {
            let is_envelope = match object.get("data") {
                None | Some(Value::Null) => false,
                Some(Value::Object(_)) => true,
                Some(_) => object.contains_key("success") && !object.contains_key("meta"),
            };
            if is_envelope {
                Ok(object.remove("data").unwrap_or(Value::Null))
            } else {
                Ok(Value::Object(object))
            }
        }
        other => Ok(other),
    }
}

/// Normalizes an offset-paginated payload. Shapes that cannot be understood
/// collapse to an empty page instead of failing.
pub fn normalize_offset_page<T: DeserializeOwned>(payload: Value) -> PageResult<T> {
    match payload {
        Value::Array(values) => {
            let items = decode_items(Value::Array(values));
            let meta = PageMeta::single_page(items.len());
            PageResult { items, meta }
        }
        Value::Object(mut object) => {
            let items = match object.remove("data") {
                Some(data @ Value::Array(_)) => decode_items(data),
                _ => {
                    warn!("paginated response has no data array; treating it as empty");
                    Vec::new()
                }
            };
            let meta = match object.remove("meta") {
                Some(Value::Null) | None => PageMeta::single_page(items.len()),
                Some(raw) => serde_json::from_value(raw).unwrap_or_else(|err| {
                    warn!(error = %err, "unreadable pagination meta");
                    PageMeta::single_page(items.len())
                }),
            };
            enforce_limit(PageResult { items, meta })
        }
        other => {
            warn!(kind = value_kind(&other), "unexpected paginated response shape");
            PageResult {
                items: Vec::new(),
                meta: PageMeta::single_page(0),
            }
        }
    }
}

/// Rows that fail to decode are skipped so one bad record never hides a page.
fn decode_items<T: DeserializeOwned>(data: Value) -> Vec<T> {
    let Value::Array(values) = data else {
        return Vec::new();
    };
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| {
            serde_json::from_value(value)
                .map_err(|err| warn!(index, error = %err, "skipping undecodable page item"))
                .ok()
        })
        .collect()
}

fn enforce_limit<T>(mut page: PageResult<T>) -> PageResult<T> {
    let limit = page.meta.limit as usize;
    if limit > 0 && page.items.len() > limit {
        warn!(
            limit,
            received = page.items.len(),
            "server returned more items than the page limit"
        );
        page.items.truncate(limit);
    }
    page
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
