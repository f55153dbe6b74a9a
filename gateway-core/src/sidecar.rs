use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::descriptor::HttpRuleSpec;
use crate::error::{GatewayError, Result};

/// A `google.api.Service` configuration document. Only the HTTP rule
/// section is consumed; any other sections are ignored.
#[derive(Debug, Deserialize)]
struct ServiceConfig {
    #[serde(rename = "type")]
    kind: Option<String>,
    http: Option<HttpSection>,
}

#[derive(Debug, Deserialize)]
struct HttpSection {
    #[serde(default)]
    rules: Vec<HttpRuleSpec>,
}

/// Locate the sidecar for a proto file: same base name with a `.yaml`,
/// `.yml` or `.json` extension, in that order.
pub fn sidecar_path(proto_path: &Path) -> Option<PathBuf> {
    for ext in ["yaml", "yml", "json"] {
        let candidate = proto_path.with_extension(ext);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

/// Load HTTP rules from a sidecar document, keyed by the rule's `selector`
/// (a fully qualified method name). Rules without a selector are dropped
/// with a warning, as is a document that is not a `google.api.Service`.
pub fn load_rules(path: &Path) -> Result<HashMap<String, HttpRuleSpec>> {
    let raw = fs::read_to_string(path).map_err(|e| {
        GatewayError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read sidecar file '{}': {e}", path.display()),
        ))
    })?;

    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let config: ServiceConfig = if is_json {
        serde_json::from_str(&raw).map_err(|e| {
            GatewayError::Descriptor(format!("invalid sidecar '{}': {e}", path.display()))
        })?
    } else {
        serde_yaml::from_str(&raw).map_err(|e| {
            GatewayError::Descriptor(format!("invalid sidecar '{}': {e}", path.display()))
        })?
    };

    if config.kind.as_deref() != Some("google.api.Service") {
        warn!(
            sidecar = %path.display(),
            kind = config.kind.as_deref().unwrap_or("<none>"),
            "ignoring sidecar: not a google.api.Service document"
        );
        return Ok(HashMap::new());
    }

    let mut rules = HashMap::new();
    for rule in config.http.map(|h| h.rules).unwrap_or_default() {
        match rule.selector.clone() {
            Some(selector) => {
                rules.insert(selector, rule);
            }
            None => {
                warn!(
                    sidecar = %path.display(),
                    "ignoring sidecar HTTP rule without a selector"
                );
            }
        }
    }
    Ok(rules)
}
