use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use prost::Message;
use prost_reflect::{DescriptorPool, MethodDescriptor, ServiceDescriptor, Value};
use serde::Deserialize;
use tracing::warn;

use crate::error::{GatewayError, Result};
use crate::sidecar;

/// HTTP methods a binding may declare.
///
/// Matches the verbs `google.api.HttpRule` can carry minus `custom`;
/// a rule with only a custom pattern produces no route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Put,
    Post,
    Delete,
    Patch,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Put => "PUT",
            HttpVerb::Post => "POST",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One registrable HTTP binding: a verb, a path template with `{name}`
/// placeholders, and an optional response-body selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBinding {
    pub verb: HttpVerb,
    pub template: String,
    /// `*` or absent returns the whole response; a field name projects it.
    pub body: Option<String>,
}

/// An HTTP rule as written in a sidecar document or in the inline
/// `google.api.http` method option. One rule may declare several verbs;
/// each becomes one [`HttpBinding`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpRuleSpec {
    pub selector: Option<String>,
    pub get: Option<String>,
    pub put: Option<String>,
    pub post: Option<String>,
    pub delete: Option<String>,
    pub patch: Option<String>,
    pub body: Option<String>,
    pub additional_bindings: Vec<HttpRuleSpec>,
}

impl HttpRuleSpec {
    /// Verb entries in the fixed evaluation order GET, PUT, POST, DELETE,
    /// PATCH.
    pub fn verb_entries(&self) -> Vec<(HttpVerb, &str)> {
        let slots = [
            (HttpVerb::Get, &self.get),
            (HttpVerb::Put, &self.put),
            (HttpVerb::Post, &self.post),
            (HttpVerb::Delete, &self.delete),
            (HttpVerb::Patch, &self.patch),
        ];
        slots
            .into_iter()
            .filter_map(|(verb, template)| template.as_deref().map(|t| (verb, t)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.verb_entries().is_empty() && self.additional_bindings.is_empty()
    }
}

/// A method with at least a resolved descriptor, and any HTTP bindings
/// attached to it. A method without bindings never produces a route.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    pub descriptor: MethodDescriptor,
    /// Primary bindings, in rule declaration order.
    pub bindings: Vec<HttpBinding>,
    /// Parsed `additional_bindings` entries. Acknowledged but not
    /// registered.
    pub additional_bindings: Vec<HttpBinding>,
}

impl BoundMethod {
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Fully qualified `package.Service.Method` name.
    pub fn full_name(&self) -> String {
        format!(
            "{}.{}",
            self.descriptor.parent_service().full_name(),
            self.descriptor.name()
        )
    }
}

/// One service from the loaded definitions, with its dot-qualified package
/// and every method (bound or not). Immutable once loaded.
#[derive(Debug, Clone)]
pub struct BoundService {
    pub package: String,
    pub name: String,
    pub descriptor: ServiceDescriptor,
    pub methods: Vec<BoundMethod>,
}

impl BoundService {
    pub fn full_name(&self) -> &str {
        self.descriptor.full_name()
    }
}

/// Wire shape of `google.api.HttpRule`, decoded straight from the method
/// options. Only the fields the gateway consumes are declared; everything
/// else (custom patterns, response_body) is skipped by prost.
#[derive(Clone, PartialEq, Message)]
struct RawHttpRule {
    #[prost(string, optional, tag = "2")]
    get: Option<String>,
    #[prost(string, optional, tag = "3")]
    put: Option<String>,
    #[prost(string, optional, tag = "4")]
    post: Option<String>,
    #[prost(string, optional, tag = "5")]
    delete: Option<String>,
    #[prost(string, optional, tag = "6")]
    patch: Option<String>,
    #[prost(string, optional, tag = "7")]
    body: Option<String>,
    #[prost(message, repeated, tag = "11")]
    additional_bindings: Vec<RawHttpRule>,
}

impl RawHttpRule {
    fn into_spec(self) -> HttpRuleSpec {
        HttpRuleSpec {
            selector: None,
            get: self.get,
            put: self.put,
            post: self.post,
            delete: self.delete,
            patch: self.patch,
            body: self.body,
            additional_bindings: self
                .additional_bindings
                .into_iter()
                .map(RawHttpRule::into_spec)
                .collect(),
        }
    }
}

/// Load service definitions from `.proto` source files.
///
/// Compiles the files with `protox` against the given import paths, then
/// walks every service declared in the named files (transitive imports are
/// compiled but produce no routes). HTTP rules come from the
/// `google.api.http` method option; a sidecar file next to a proto
/// (`<stem>.yaml`, `.yml` or `.json`) overrides the inline rule for any
/// method it names.
pub fn load_services(import_paths: &[String], proto_files: &[String]) -> Result<Vec<BoundService>> {
    let includes: Vec<&str> = if import_paths.is_empty() {
        // Default to current directory if no import paths specified
        vec!["."]
    } else {
        import_paths.iter().map(String::as_str).collect()
    };

    let fds = protox::compile(proto_files, &includes)
        .map_err(|e| GatewayError::Proto(format!("failed to compile proto files: {e}")))?;

    let pool = DescriptorPool::from_file_descriptor_set(fds)
        .map_err(|e| GatewayError::Proto(format!("failed to build descriptor pool: {e}")))?;

    // Sidecar rules across all requested files, keyed by fully qualified
    // method name.
    let mut overlay = std::collections::HashMap::new();
    for proto in proto_files {
        if let Some(path) = resolve_proto_path(proto, &includes) {
            if let Some(sidecar_file) = sidecar::sidecar_path(&path) {
                overlay.extend(sidecar::load_rules(&sidecar_file)?);
            }
        }
    }

    // Routes are generated only for services declared in the files named on
    // the command line, in the order those files were given.
    let requested = requested_file_names(proto_files, &includes);
    let mut services = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for file_name in &requested {
        let Some(file) = pool.get_file_by_name(file_name) else {
            continue;
        };
        for service in file.services() {
            if !seen.insert(service.full_name().to_string()) {
                continue;
            }
            services.push(bind_service(&pool, &service, &overlay));
        }
    }

    Ok(services)
}

/// Build a [`BoundService`] from a pool service, applying the sidecar
/// overlay before falling back to the inline annotation.
pub fn bind_service(
    pool: &DescriptorPool,
    service: &ServiceDescriptor,
    overlay: &std::collections::HashMap<String, HttpRuleSpec>,
) -> BoundService {
    let package = service.parent_file().package_name().to_string();
    let mut methods = Vec::new();

    for method in service.methods() {
        let full_name = format!("{}.{}", service.full_name(), method.name());
        let rule = overlay
            .get(&full_name)
            .cloned()
            .or_else(|| inline_rule(pool, &method));

        let (bindings, additional_bindings) = match rule {
            Some(rule) => bindings_from_spec(&rule, &full_name),
            None => (Vec::new(), Vec::new()),
        };

        methods.push(BoundMethod {
            descriptor: method,
            bindings,
            additional_bindings,
        });
    }

    BoundService {
        package,
        name: service.name().to_string(),
        descriptor: service.clone(),
        methods,
    }
}

/// Extract the `google.api.http` option from a method, if present.
fn inline_rule(pool: &DescriptorPool, method: &MethodDescriptor) -> Option<HttpRuleSpec> {
    let ext = pool.get_extension_by_name("google.api.http")?;
    let options = method.options();
    if !options.has_extension(&ext) {
        return None;
    }
    let value = options.get_extension(&ext);
    let Value::Message(rule_msg) = value.as_ref() else {
        return None;
    };
    match RawHttpRule::decode(rule_msg.encode_to_vec().as_slice()) {
        Ok(raw) => Some(raw.into_spec()),
        Err(e) => {
            warn!(
                method = method.full_name(),
                "ignoring undecodable google.api.http option: {e}"
            );
            None
        }
    }
}

/// Turn a rule into registrable bindings, skipping malformed templates.
/// A bad entry never aborts the rest of the registration.
fn bindings_from_spec(
    spec: &HttpRuleSpec,
    method_name: &str,
) -> (Vec<HttpBinding>, Vec<HttpBinding>) {
    let primary = collect_bindings(spec, method_name);
    let additional = spec
        .additional_bindings
        .iter()
        .flat_map(|nested| collect_bindings(nested, method_name))
        .collect();
    (primary, additional)
}

fn collect_bindings(spec: &HttpRuleSpec, method_name: &str) -> Vec<HttpBinding> {
    let mut bindings = Vec::new();
    for (verb, template) in spec.verb_entries() {
        if !template.starts_with('/') {
            warn!(
                method = method_name,
                verb = %verb,
                template,
                "skipping HTTP binding with malformed path template"
            );
            continue;
        }
        bindings.push(HttpBinding {
            verb,
            template: template.to_string(),
            body: spec.body.clone(),
        });
    }
    bindings
}

/// Find a proto file on disk: as given, or under one of the import paths.
fn resolve_proto_path(proto: &str, includes: &[&str]) -> Option<PathBuf> {
    let direct = PathBuf::from(proto);
    if direct.exists() {
        return Some(direct);
    }
    for include in includes {
        let joined = Path::new(include).join(proto);
        if joined.exists() {
            return Some(joined);
        }
    }
    None
}

/// Map the proto paths given on the command line onto the include-relative
/// names the compiled pool uses (`protos/api.proto` with `-I protos`
/// becomes `api.proto`).
fn requested_file_names(proto_files: &[String], includes: &[&str]) -> Vec<String> {
    proto_files
        .iter()
        .map(|proto| {
            for include in includes {
                let prefix = format!("{}/", include.trim_end_matches('/'));
                if let Some(stripped) = proto.strip_prefix(&prefix) {
                    return stripped.to_string();
                }
            }
            proto.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Write a proto fixture set (with google.api annotations) to a temp
    /// directory and compile it through `load_services`.
    fn write_fixtures(dir: &Path) {
        let api_dir = dir.join("google/api");
        fs::create_dir_all(&api_dir).unwrap();
        fs::write(
            api_dir.join("http.proto"),
            r#"syntax = "proto3";
package google.api;
message Http { repeated HttpRule rules = 1; }
message HttpRule {
  string selector = 1;
  oneof pattern {
    string get = 2;
    string put = 3;
    string post = 4;
    string delete = 5;
    string patch = 6;
    CustomHttpPattern custom = 8;
  }
  string body = 7;
  string response_body = 12;
  repeated HttpRule additional_bindings = 11;
}
message CustomHttpPattern { string kind = 1; string path = 2; }
"#,
        )
        .unwrap();
        fs::write(
            api_dir.join("annotations.proto"),
            r#"syntax = "proto3";
package google.api;
import "google/api/http.proto";
import "google/protobuf/descriptor.proto";
extend google.protobuf.MethodOptions { HttpRule http = 72295728; }
"#,
        )
        .unwrap();
        fs::write(
            dir.join("hello.proto"),
            r#"syntax = "proto3";
package test.v1;
import "google/api/annotations.proto";
service Greeter {
  rpc SayHello (HelloRequest) returns (HelloReply) {
    option (google.api.http) = { get: "/v1/hi/{name}" };
  }
  rpc Unmapped (HelloRequest) returns (HelloReply);
  rpc Watch (HelloRequest) returns (stream HelloReply) {
    option (google.api.http) = { get: "/v1/watch/{name}" };
  }
}
message HelloRequest { string name = 1; }
message HelloReply { string message = 1; }
"#,
        )
        .unwrap();
    }

    #[test]
    fn load_services_extracts_inline_bindings() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());

        let includes = vec![dir.path().to_string_lossy().into_owned()];
        let services = load_services(&includes, &["hello.proto".to_string()]).unwrap();

        assert_eq!(services.len(), 1);
        let svc = &services[0];
        assert_eq!(svc.package, "test.v1");
        assert_eq!(svc.name, "Greeter");
        assert_eq!(svc.full_name(), "test.v1.Greeter");

        let hello = &svc.methods[0];
        assert_eq!(hello.name(), "SayHello");
        assert_eq!(hello.full_name(), "test.v1.Greeter.SayHello");
        assert_eq!(
            hello.bindings,
            vec![HttpBinding {
                verb: HttpVerb::Get,
                template: "/v1/hi/{name}".to_string(),
                body: None,
            }]
        );

        // A method without an HTTP rule carries no bindings.
        let unmapped = &svc.methods[1];
        assert!(unmapped.bindings.is_empty());
    }

    #[test]
    fn sidecar_overrides_inline_rule() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());
        fs::write(
            dir.path().join("hello.yaml"),
            r#"type: google.api.Service
http:
  rules:
    - selector: test.v1.Greeter.SayHello
      post: /v2/hello
      body: message
"#,
        )
        .unwrap();

        let includes = vec![dir.path().to_string_lossy().into_owned()];
        let services = load_services(&includes, &["hello.proto".to_string()]).unwrap();

        let hello = &services[0].methods[0];
        assert_eq!(
            hello.bindings,
            vec![HttpBinding {
                verb: HttpVerb::Post,
                template: "/v2/hello".to_string(),
                body: Some("message".to_string()),
            }]
        );
    }

    #[test]
    fn imported_files_produce_no_services() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());

        let includes = vec![dir.path().to_string_lossy().into_owned()];
        let services = load_services(&includes, &["hello.proto".to_string()]).unwrap();

        // google/api files are compiled as imports but only hello.proto's
        // services are returned.
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn rule_with_multiple_verbs_yields_one_binding_each() {
        let spec = HttpRuleSpec {
            get: Some("/v1/things/{id}".to_string()),
            post: Some("/v1/things".to_string()),
            body: Some("*".to_string()),
            ..Default::default()
        };
        let (primary, additional) = bindings_from_spec(&spec, "test.Things.Get");
        assert_eq!(primary.len(), 2);
        assert_eq!(primary[0].verb, HttpVerb::Get);
        assert_eq!(primary[1].verb, HttpVerb::Post);
        assert_eq!(primary[0].body.as_deref(), Some("*"));
        assert!(additional.is_empty());
    }

    #[test]
    fn malformed_template_is_skipped() {
        let spec = HttpRuleSpec {
            get: Some("no-leading-slash".to_string()),
            put: Some("/v1/ok".to_string()),
            ..Default::default()
        };
        let (primary, _) = bindings_from_spec(&spec, "test.Things.Get");
        assert_eq!(primary.len(), 1);
        assert_eq!(primary[0].verb, HttpVerb::Put);
    }

    #[test]
    fn additional_bindings_are_collected_separately() {
        let spec = HttpRuleSpec {
            get: Some("/v1/things/{id}".to_string()),
            additional_bindings: vec![HttpRuleSpec {
                get: Some("/v2/things/{id}".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let (primary, additional) = bindings_from_spec(&spec, "test.Things.Get");
        assert_eq!(primary.len(), 1);
        assert_eq!(additional.len(), 1);
        assert_eq!(additional[0].template, "/v2/things/{id}");
    }

    #[test]
    fn requested_names_strip_include_prefix() {
        let names = requested_file_names(
            &["protos/api.proto".to_string(), "other.proto".to_string()],
            &["protos"],
        );
        assert_eq!(names, vec!["api.proto", "other.proto"]);
    }

    #[test]
    fn streaming_methods_load_with_their_bindings() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());

        let includes = vec![dir.path().to_string_lossy().into_owned()];
        let services = load_services(&includes, &["hello.proto".to_string()]).unwrap();
        let streaming = &services[0].methods[2];
        // Streaming methods still load; the registrar decides to skip them.
        assert_eq!(streaming.name(), "Watch");
        assert!(!streaming.bindings.is_empty());
        assert!(streaming.descriptor.is_server_streaming());
    }

    #[test]
    fn verb_entries_follow_declaration_order() {
        let spec = HttpRuleSpec {
            patch: Some("/p".to_string()),
            get: Some("/g".to_string()),
            ..Default::default()
        };
        let entries = spec.verb_entries();
        assert_eq!(entries[0].0, HttpVerb::Get);
        assert_eq!(entries[1].0, HttpVerb::Patch);
    }
}
