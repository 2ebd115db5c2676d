//! Response normalization.
//!
//! The backend speaks snake_case; callers get camelCase. [`normalize`] walks
//! a JSON value and rewrites every object key, recursing into values and
//! array elements. Scalars pass through untouched.
//!
//! # Line-item compaction
//!
//! One rule is deliberately lossy. A field whose value is a non-empty array
//! of line-item records (objects carrying the [`LINE_ITEM_SENTINEL`] key) is
//! replaced by the number of items. List screens only show the count;
//! anything needing the items fetches the resource's detail endpoint. The
//! rule is tied to this one sentinel and applies to nothing else.
//!
//! ```
//! use dashboard_client::normalize;
//! use serde_json::json;
//!
//! let order = json!({"stock_code": "STK1", "nested_list": [{"boy_mm": 10}]});
//! assert_eq!(normalize(order), json!({"stockCode": "STK1", "nestedList": 1}));
//!
//! let plain = json!({"a_b": [{"c_d": 1}]});
//! assert_eq!(normalize(plain), json!({"aB": [{"cD": 1}]}));
//! ```

use serde_json::{Map, Value};

/// Key whose presence marks a record as a line item (its length in mm).
pub const LINE_ITEM_SENTINEL: &str = "boy_mm";

/// Recursively camelCase object keys and compact line-item arrays.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(normalize_object(map)),
        scalar => scalar,
    }
}

fn normalize_object(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| {
            let value = match line_item_count(&value) {
                Some(count) => Value::from(count),
                None => normalize(value),
            };
            (snake_to_camel(&key), value)
        })
        .collect()
}

fn line_item_count(value: &Value) -> Option<usize> {
    let items = value.as_array()?;
    let all_line_items = items
        .iter()
        .all(|item| item.as_object().is_some_and(|o| o.contains_key(LINE_ITEM_SENTINEL)));

    (!items.is_empty() && all_line_items).then_some(items.len())
}

/// `order_line_id` → `orderLineId`.
///
/// An underscore followed by a lowercase ASCII letter becomes that letter
/// uppercased. Leading underscores and underscores before digits or
/// capitals are kept.
pub fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    let mut leading = true;

    while let Some(c) = chars.next() {
        if c == '_' && !leading {
            if let Some(next) = chars.peek().copied().filter(char::is_ascii_lowercase) {
                out.push(next.to_ascii_uppercase());
                chars.next();
                continue;
            }
        }
        leading = leading && c == '_';
        out.push(c);
    }
    out
}
