use clap::Parser;

use gateway_core::connection::BackendConfig;

/// Serve annotated gRPC services as a REST/JSON API.
///
/// Every method carrying a `google.api.http` option (or an entry in a
/// sidecar YAML/JSON file next to its proto) is exposed as an HTTP route.
/// Incoming requests are translated into gRPC calls against the backend
/// given with --grpc; responses and errors are translated back to JSON.
///
/// The backend connection is plain-text HTTP/2 unless the full
/// --ca/--key/--cert triple is provided, in which case the gateway dials
/// the backend with mutual TLS.
#[derive(Parser, Debug)]
#[command(
    name = "grpc-gateway",
    version,
    after_help = "Example usage:\n  \
        grpc-gateway -I protos api.proto\n  \
        grpc-gateway --grpc localhost:5051 --port 8080 api.proto\n  \
        grpc-gateway -m /api -I protos api.proto users.proto"
)]
pub struct Cli {
    /// Proto files defining the services to expose.
    #[arg(value_name = "DEFINITION.proto", required = true)]
    pub proto: Vec<String>,

    /// The port to serve the JSON proxy on.
    #[arg(short = 'p', long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// The host and port the backend gRPC server is running on.
    #[arg(short = 'g', long, env = "GRPC_HOST", default_value = "localhost:5051")]
    pub grpc: String,

    /// Path to resolve proto imports from (repeatable).
    #[arg(short = 'I', long = "include", value_name = "PATH")]
    pub include: Vec<String>,

    /// SSL CA certificate for the gRPC backend.
    #[arg(long)]
    pub ca: Option<String>,

    /// SSL client key for the gRPC backend.
    #[arg(long)]
    pub key: Option<String>,

    /// SSL client certificate for the gRPC backend.
    #[arg(long)]
    pub cert: Option<String>,

    /// URL prefix to mount the gateway on.
    #[arg(short = 'm', long, default_value = "/")]
    pub mountpoint: String,

    /// Disable per-request logging.
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl Cli {
    /// Flag validation beyond what clap expresses: the TLS triple is
    /// all-or-none, and the mountpoint must be an absolute path prefix.
    pub fn validate(&self) -> Result<(), String> {
        let given = [self.ca.is_some(), self.key.is_some(), self.cert.is_some()];
        if given.iter().any(|g| *g) && !given.iter().all(|g| *g) {
            return Err("SSL requires --ca, --key, and --cert".to_string());
        }
        if !self.mountpoint.starts_with('/') {
            return Err(format!(
                "--mountpoint must start with '/', got '{}'",
                self.mountpoint
            ));
        }
        Ok(())
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            cacert: self.ca.clone(),
            cert: self.cert.clone(),
            key: self.key.clone(),
            ..Default::default()
        }
    }
}
