use serde_json::Value;

use crate::error::{GatewayError, Result};

/// Project an RPC response down to the JSON body to serialize.
///
/// An absent selector or `*` returns the response unchanged. A field name
/// returns that field's value; a selector naming an absent field is a hard
/// error (surfaced as a 500), never a silent null.
pub fn project(response: &Value, selector: Option<&str>) -> Result<Value> {
    match selector {
        None | Some("*") => Ok(response.clone()),
        Some(field) => response.get(field).cloned().ok_or_else(|| {
            GatewayError::Projection(format!("response has no field named {field:?}"))
        }),
    }
}
