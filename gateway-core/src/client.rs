use std::collections::HashMap;
use std::sync::Arc;

use http::uri::PathAndQuery;
use prost_reflect::{DynamicMessage, MethodDescriptor, ServiceDescriptor};
use tonic::client::Grpc;
use tonic::metadata::MetadataMap;
use tonic::transport::Channel;

use crate::codec::DynamicCodec;
use crate::error::{GatewayError, Result};

/// A live client handle for one backend service.
///
/// Wraps a clone of the shared channel; constructed once per
/// (package, service) during route registration and reused by every
/// request for the lifetime of the process.
pub struct ServiceClient {
    service: ServiceDescriptor,
    channel: Channel,
}

impl ServiceClient {
    pub fn new(service: ServiceDescriptor, channel: Channel) -> Self {
        ServiceClient { service, channel }
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    /// Invoke a unary method on the backend with the given request message
    /// and metadata, and wait for the single response message.
    ///
    /// The call suspends only here; completions of concurrently issued
    /// calls may arrive in any order.
    pub async fn call_unary(
        &self,
        method: &MethodDescriptor,
        request: DynamicMessage,
        metadata: MetadataMap,
    ) -> Result<DynamicMessage> {
        // gRPC method path: /package.Service/Method
        let path: PathAndQuery = format!("/{}/{}", self.service.full_name(), method.name())
            .parse()
            .map_err(|e| GatewayError::InvalidArgument(format!("invalid method path: {e}")))?;

        let codec = DynamicCodec::new(method.input(), method.output());

        let mut grpc = Grpc::new(self.channel.clone())
            .accept_compressed(tonic::codec::CompressionEncoding::Gzip);
        grpc.ready()
            .await
            .map_err(|e| GatewayError::Other(format!("backend not ready: {e}").into()))?;

        let mut req = tonic::Request::new(request);
        *req.metadata_mut() = metadata;

        let response = grpc.unary(req, path, codec).await?;
        Ok(response.into_inner())
    }
}

/// One route's dispatch target, resolved once at registration time so
/// request handling never has to look up method names dynamically.
pub struct RouteTarget {
    pub client: Arc<ServiceClient>,
    pub method: MethodDescriptor,
    /// Fully qualified `package.Service.Method` name, used for lookup and
    /// logging.
    pub full_name: String,
}

/// The registration-time lookup table from fully qualified method name to
/// its resolved target. Built once; read-only while serving.
#[derive(Default)]
pub struct DispatchTable {
    entries: HashMap<String, Arc<RouteTarget>>,
}

impl DispatchTable {
    pub fn insert(&mut self, target: Arc<RouteTarget>) {
        self.entries.insert(target.full_name.clone(), target);
    }

    pub fn lookup(&self, package: &str, service: &str, method: &str) -> Option<&Arc<RouteTarget>> {
        let key = if package.is_empty() {
            format!("{service}.{method}")
        } else {
            format!("{package}.{service}.{method}")
        };
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Client handles addressed by dot-qualified package path and service name.
///
/// Package lookups resolve hierarchically: each dot segment descends one
/// level, creating empty levels as needed. At most one client exists per
/// (package, service) pair; entries are created during registration and
/// never removed. The directory is owned by the registrar and shared into
/// handlers behind `Arc`s, never a process-wide global.
#[derive(Default)]
pub struct ClientDirectory {
    root: PackageNode,
}

#[derive(Default)]
struct PackageNode {
    children: HashMap<String, PackageNode>,
    services: HashMap<String, Arc<ServiceClient>>,
}

impl ClientDirectory {
    /// Fetch the client for (package, service), constructing and caching it
    /// on first use.
    pub fn get_or_create(
        &mut self,
        package: &str,
        service: &ServiceDescriptor,
        channel: &Channel,
    ) -> Arc<ServiceClient> {
        let node = self.node_mut(package);
        Arc::clone(
            node.services
                .entry(service.name().to_string())
                .or_insert_with(|| Arc::new(ServiceClient::new(service.clone(), channel.clone()))),
        )
    }

    /// Look up an existing client without creating one.
    pub fn get(&self, package: &str, service: &str) -> Option<Arc<ServiceClient>> {
        let mut node = &self.root;
        if !package.is_empty() {
            for segment in package.split('.') {
                node = node.children.get(segment)?;
            }
        }
        node.services.get(service).cloned()
    }

    fn node_mut(&mut self, package: &str) -> &mut PackageNode {
        let mut node = &mut self.root;
        if package.is_empty() {
            return node;
        }
        for segment in package.split('.') {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node
    }
}
