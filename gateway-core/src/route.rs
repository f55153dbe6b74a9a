use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::client::RouteTarget;
use crate::descriptor::HttpBinding;

/// Regex matching `{name}` placeholders in a path template. Dotted names
/// (`{user.id}`) are allowed; the dots stay part of the parameter
/// identifier, they never split the segment.
static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([\w.]+)\}").expect("placeholder regex is valid"));

/// Convert a gRPC-style path template into the router's pattern syntax and
/// collect the parameter names.
///
/// Each `{name}` placeholder becomes a `:name` single-segment capture.
/// Parameters are returned in order of first appearance, deduplicated.
/// A template without placeholders compiles to itself unchanged.
pub fn compile_template(template: &str) -> (String, Vec<String>) {
    let mut params: Vec<String> = Vec::new();
    for captures in PLACEHOLDER_REGEX.captures_iter(template) {
        let name = &captures[1];
        if !params.iter().any(|p| p == name) {
            params.push(name.to_string());
        }
    }
    let pattern = PLACEHOLDER_REGEX.replace_all(template, ":$1").into_owned();
    (pattern, params)
}

/// A registrable route: the compiled pattern, its parameter names, the
/// owning binding, and the dispatch target resolved at registration time.
#[derive(Clone)]
pub struct CompiledRoute {
    pub pattern: String,
    pub params: Vec<String>,
    pub binding: HttpBinding,
    pub target: Arc<RouteTarget>,
}
