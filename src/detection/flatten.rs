// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! JSON to flat event conversion
//!
//! `{"result": {"links": [{"href": "x"}]}}` becomes
//! `{"result.links[0].href": "x"}`. Only scalar leaves are kept; empty
//! objects and arrays disappear.

use std::collections::BTreeMap;

use serde_json::Value;

/// A flattened event: dotted path to scalar value
pub type Event = BTreeMap<String, Value>;

/// Flatten a JSON value into dotted paths
pub fn flatten(value: &Value) -> Event {
    let mut out = Event::new();
    flatten_into("", value, &mut out);
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Event) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                if prefix.is_empty() {
                    flatten_into(key, inner, out);
                } else {
                    flatten_into(&format!("{}.{}", prefix, key), inner, out);
                }
            }
        }
        Value::Array(items) => {
            for (i, inner) in items.iter().enumerate() {
                flatten_into(&format!("{}[{}]", prefix, i), inner, out);
            }
        }
        scalar => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), scalar.clone());
            }
        }
    }
}
