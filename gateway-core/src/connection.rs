use std::time::Duration;

use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};

use crate::error::{GatewayError, Result};

/// Default connection timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: f64 = 10.0;

/// Backend connection configuration.
///
/// This struct decouples the library from any CLI framework (e.g. clap).
/// The CLI binary builds a `BackendConfig` from its parsed arguments and
/// passes it to `backend_channel()`.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    /// File containing trusted root certificates for verifying the backend.
    pub cacert: Option<String>,

    /// File containing the client certificate (public key).
    pub cert: Option<String>,

    /// File containing the client private key.
    pub key: Option<String>,

    /// Override server name when validating the TLS certificate.
    pub authority: Option<String>,

    /// Maximum time, in seconds, to wait for the connection to be
    /// established. Defaults to 10 seconds.
    pub connect_timeout: Option<f64>,

    /// If present, the maximum idle time in seconds for keepalive.
    pub keepalive_time: Option<f64>,

    /// Custom User-Agent string to prepend.
    pub user_agent: Option<String>,
}

impl BackendConfig {
    /// The backend is dialed with TLS only when certificate material is
    /// configured; otherwise the channel is plain-text HTTP/2.
    pub fn wants_tls(&self) -> bool {
        self.cacert.is_some() || self.cert.is_some() || self.key.is_some()
    }
}

/// Build the shared channel to the RPC backend.
///
/// The channel connects lazily: the gateway starts serving before the
/// backend is reachable, and the first request triggers the dial. Transport
/// retries, pooling and deadlines beyond this configuration are the
/// channel's own concern.
pub fn backend_channel(config: &BackendConfig, address: &str) -> Result<Channel> {
    let scheme = if config.wants_tls() { "https" } else { "http" };
    let uri = format!("{scheme}://{address}");

    let mut endpoint = build_endpoint(&uri, config)?;

    if config.wants_tls() {
        let tls = build_tls_config(config)?;
        endpoint = endpoint
            .tls_config(tls)
            .map_err(|e| GatewayError::Other(format!("TLS configuration error: {e}").into()))?;
    }

    Ok(endpoint.connect_lazy())
}

/// Build common Endpoint configuration (timeout, keepalive, user-agent).
fn build_endpoint(uri: &str, config: &BackendConfig) -> Result<Endpoint> {
    let mut endpoint: Endpoint = Channel::from_shared(uri.to_string())
        .map_err(|e| GatewayError::InvalidArgument(format!("invalid backend address: {e}")))?;

    let connect_timeout = config
        .connect_timeout
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
    endpoint = endpoint.connect_timeout(Duration::from_secs_f64(connect_timeout));

    if let Some(keepalive_secs) = config.keepalive_time {
        endpoint = endpoint
            .keep_alive_timeout(Duration::from_secs_f64(keepalive_secs))
            .keep_alive_while_idle(true);
    }

    let ua = build_user_agent(config);
    endpoint = endpoint
        .user_agent(ua.as_str())
        .map_err(|e| GatewayError::Other(format!("failed to set user-agent: {e}").into()))?;

    Ok(endpoint)
}

/// Build tonic's ClientTlsConfig from the configured certificate material.
fn build_tls_config(config: &BackendConfig) -> Result<ClientTlsConfig> {
    let mut tls = ClientTlsConfig::new();

    if let Some(ref cacert_path) = config.cacert {
        let ca_pem = read_pem(cacert_path, "CA certificate")?;
        tls = tls.ca_certificate(Certificate::from_pem(ca_pem));
    } else {
        tls = tls.with_native_roots();
    }

    if let Some(ref authority) = config.authority {
        tls = tls.domain_name(authority.clone());
    }

    // Client certificate for mTLS
    if let Some(ref cert_path) = config.cert {
        let key_path = config
            .key
            .as_ref()
            .ok_or_else(|| GatewayError::InvalidArgument("--key is required with --cert".into()))?;
        let cert_pem = read_pem(cert_path, "client certificate")?;
        let key_pem = read_pem(key_path, "client key")?;
        tls = tls.identity(Identity::from_pem(cert_pem, key_pem));
    }

    Ok(tls)
}

fn read_pem(path: &str, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        GatewayError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read {what} '{path}': {e}"),
        ))
    })
}

/// Build the User-Agent string: "grpc-gateway/<version>", prepended with a
/// custom user-agent if specified.
pub fn build_user_agent(config: &BackendConfig) -> String {
    let version = env!("CARGO_PKG_VERSION");
    let base = format!("grpc-gateway/{version}");

    match &config.user_agent {
        Some(custom) => format!("{custom} {base}"),
        None => base,
    }
}
