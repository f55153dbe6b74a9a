use std::collections::HashMap;

use http::HeaderMap;
use serde_json::{Map, Value};
use tracing::debug;

/// Everything the transcoding engine consumes from one HTTP request.
///
/// Built by the route handler from the host router's extractors and owned
/// by that handler for the duration of the request. Path and query values
/// arrive as raw strings; the body as parsed JSON, if any.
#[derive(Debug, Default)]
pub struct RequestFrame {
    pub path_params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

/// Names eligible for overwrite during the merge: the union of the
/// query-string keys and the route's path parameters. Body fields outside
/// this set pass through untouched.
pub fn candidate_params(frame: &RequestFrame, route_params: &[String]) -> Vec<String> {
    let mut out: Vec<String> = frame.query.keys().cloned().collect();
    // Query maps are unordered; sort so the result is deterministic.
    out.sort();
    for param in route_params {
        if !out.iter().any(|name| name == param) {
            out.push(param.clone());
        }
    }
    out
}

/// Build the structured RPC request value for one HTTP request.
///
/// The parsed JSON body is the base; candidate names are then overwritten
/// by the query string and finally by path captures, so precedence is
/// path > query > body. Every flat key (including dotted body keys) is
/// materialized into nested structure: `user.id=5` becomes
/// `{"user":{"id":"5"}}`.
///
/// Path and query values stay JSON strings. They are never coerced to the
/// field's scalar type; proto3 JSON accepts strings for numeric fields,
/// so numeric parameters still decode downstream.
pub fn merge_request(frame: &RequestFrame, route_params: &[String]) -> Value {
    let mut flat = match &frame.body {
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            debug!(body = %other, "ignoring non-object request body");
            Map::new()
        }
        None => Map::new(),
    };

    for name in candidate_params(frame, route_params) {
        if let Some(value) = frame.query.get(&name) {
            flat.insert(name.clone(), Value::String(value.clone()));
        }
        if let Some(value) = frame.path_params.get(&name) {
            flat.insert(name.clone(), Value::String(value.clone()));
        }
    }

    let mut tree = Map::new();
    for (key, value) in flat {
        assign_field_path(&mut tree, &key, value);
    }
    Value::Object(tree)
}

/// Set a dotted field path on an owned JSON object, creating intermediate
/// objects as needed. Existing non-object intermediates are replaced.
fn assign_field_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').collect();
    let Some((leaf, parents)) = parts.split_last() else {
        return;
    };
    let mut current = root;
    for part in parents {
        let entry = current
            .entry((*part).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(map) = entry else {
            return;
        };
        current = map;
    }
    current.insert((*leaf).to_string(), value);
}
