use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter};
use axum::{Json, Router};
use prost_reflect::{DeserializeOptions, DynamicMessage, SerializeOptions};
use serde_json::{json, Value};
use tonic::transport::Channel;
use tracing::{debug, error, info, warn};

use crate::client::{ClientDirectory, DispatchTable, RouteTarget};
use crate::descriptor::{BoundService, HttpVerb};
use crate::error::{GatewayError, Result};
use crate::merge::{merge_request, RequestFrame};
use crate::metadata::metadata_from_header_map;
use crate::project::project;
use crate::route::{compile_template, CompiledRoute};

/// Gateway-wide behavior switches.
#[derive(Debug, Clone, Default)]
pub struct GatewayOptions {
    /// Log one line per proxied request: client IP, fully qualified method
    /// name and the merged parameters. A side effect only; never changes
    /// the response.
    pub debug: bool,
}

/// Routes collected in declaration order.
///
/// The host router refuses duplicate (verb, pattern) registrations, so the
/// original "last registered wins" router semantics are applied here: a
/// later entry for the same (verb, pattern) replaces the earlier one.
#[derive(Default)]
pub struct RouteSet {
    routes: Vec<CompiledRoute>,
}

impl RouteSet {
    pub fn insert(&mut self, route: CompiledRoute) {
        self.routes
            .retain(|r| !(r.binding.verb == route.binding.verb && r.pattern == route.pattern));
        self.routes.push(route);
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    /// Register every collected route with an axum router.
    pub fn into_router(self, options: &GatewayOptions) -> Router {
        let debug = options.debug;
        let mut router = Router::new();
        for route in self.routes {
            let pattern = route.pattern.clone();
            let filter = method_filter(route.binding.verb);
            let route = Arc::new(route);
            let handler = move |Path(path_params): Path<HashMap<String, String>>,
                                query: Option<Query<HashMap<String, String>>>,
                                connect: Option<ConnectInfo<SocketAddr>>,
                                headers: HeaderMap,
                                body: Option<Json<Value>>| async move {
                let frame = RequestFrame {
                    path_params,
                    query: query.map(|Query(q)| q).unwrap_or_default(),
                    body: body.map(|Json(v)| v),
                    headers,
                };
                let remote = connect.map(|ConnectInfo(addr)| addr);
                handle_request(&route, frame, remote, debug).await
            };
            router = router.route(&pattern, on(filter, handler));
        }
        router
    }
}

/// Build the gateway router and dispatch table for the given services.
///
/// For each service, each method with at least one binding, and each verb
/// that binding declares, one route is compiled and registered, in
/// declaration order. Clients are created (or reused) per (package,
/// service) in the directory; streaming methods are skipped with a
/// warning. The directory and table are fully populated before the router
/// is returned, so everything handlers touch is read-only while serving.
pub fn build_gateway(
    services: &[BoundService],
    channel: Channel,
    options: &GatewayOptions,
) -> (Router, DispatchTable) {
    let mut directory = ClientDirectory::default();
    let mut dispatch = DispatchTable::default();
    let routes = collect_routes(services, channel, &mut directory, &mut dispatch);
    (routes.into_router(options), dispatch)
}

fn collect_routes(
    services: &[BoundService],
    channel: Channel,
    directory: &mut ClientDirectory,
    dispatch: &mut DispatchTable,
) -> RouteSet {
    let mut routes = RouteSet::default();

    for service in services {
        for method in &service.methods {
            if method.bindings.is_empty() {
                continue;
            }
            let descriptor = &method.descriptor;
            let full_name = method.full_name();
            if descriptor.is_client_streaming() || descriptor.is_server_streaming() {
                warn!(
                    method = %full_name,
                    "skipping streaming method: not supported over the JSON gateway"
                );
                continue;
            }

            let client = directory.get_or_create(&service.package, &service.descriptor, &channel);
            let target = Arc::new(RouteTarget {
                client,
                method: descriptor.clone(),
                full_name,
            });
            dispatch.insert(Arc::clone(&target));

            for binding in &method.bindings {
                let (pattern, params) = compile_template(&binding.template);
                info!(verb = %binding.verb, path = %binding.template, method = %target.full_name, "registering route");
                routes.insert(CompiledRoute {
                    pattern,
                    params,
                    binding: binding.clone(),
                    target: Arc::clone(&target),
                });
            }

            if !method.additional_bindings.is_empty() {
                debug!(
                    method = %target.full_name,
                    count = method.additional_bindings.len(),
                    "additional bindings present but not registered"
                );
            }
        }
    }

    routes
}

fn method_filter(verb: HttpVerb) -> MethodFilter {
    match verb {
        HttpVerb::Get => MethodFilter::GET,
        HttpVerb::Put => MethodFilter::PUT,
        HttpVerb::Post => MethodFilter::POST,
        HttpVerb::Delete => MethodFilter::DELETE,
        HttpVerb::Patch => MethodFilter::PATCH,
    }
}

/// One request, end to end. Every failure is mapped to a response at this
/// boundary; a malformed request can never take the gateway down.
async fn handle_request(
    route: &CompiledRoute,
    frame: RequestFrame,
    remote: Option<SocketAddr>,
    debug: bool,
) -> Response {
    match dispatch_request(route, frame, remote, debug).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => {
            error!(method = %route.target.full_name, error = %err, "request failed");
            error_response(&err)
        }
    }
}

async fn dispatch_request(
    route: &CompiledRoute,
    frame: RequestFrame,
    remote: Option<SocketAddr>,
    debug: bool,
) -> Result<Value> {
    let merged = merge_request(&frame, &route.params);

    if debug {
        debug!(
            client = %client_ip(&frame.headers, remote),
            method = %route.target.full_name,
            params = %merged,
            "proxying request"
        );
    }

    let metadata = metadata_from_header_map(&frame.headers);

    // Extra body fields the request message does not declare are ignored
    // rather than failing the call.
    let request = DynamicMessage::deserialize_with_options(
        route.target.method.input(),
        merged,
        &DeserializeOptions::new().deny_unknown_fields(false),
    )
    .map_err(|e| GatewayError::Proto(format!("failed to build request message: {e}")))?;

    let response = route
        .target
        .client
        .call_unary(&route.target.method, request, metadata)
        .await?;

    let value = response
        .serialize_with_options(
            serde_json::value::Serializer,
            &SerializeOptions::new().skip_default_fields(false),
        )
        .map_err(|e| GatewayError::Proto(format!("failed to serialize response: {e}")))?;

    project(&value, route.binding.body.as_deref())
}

/// Client address for the debug log: forwarding header first, transport
/// address otherwise.
fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| remote.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Every RPC-reported failure becomes a 500 with `{code, message}` taken
/// from the error; no finer-grained status mapping.
fn error_response(err: &GatewayError) -> Response {
    let (code, message) = match err {
        GatewayError::GrpcStatus(status) => (status.code() as i32, status.message().to_string()),
        GatewayError::Projection(_) => (tonic::Code::Internal as i32, err.to_string()),
        _ => (tonic::Code::Unknown as i32, err.to_string()),
    };
    let body = json!({ "code": code, "message": message });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
