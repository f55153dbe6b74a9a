use std::fmt;

/// All error types produced by the gateway library.
///
/// Registration-time failures (`Descriptor`, `Proto`, `Io`) abort or skip
/// work while routes are being built; request-time failures (`GrpcStatus`,
/// `Projection`) are mapped to an HTTP 500 response at the handler boundary.
#[derive(Debug)]
pub enum GatewayError {
    /// A service definition carries an HTTP binding the gateway cannot
    /// register (unsupported verb, malformed template, bad sidecar entry).
    Descriptor(String),

    /// An invalid argument was provided (e.g. malformed method path).
    InvalidArgument(String),

    /// An I/O error (file read, network, etc.).
    Io(std::io::Error),

    /// A protobuf compile/encode/decode error.
    Proto(String),

    /// The response-body selector names a field absent from the response.
    Projection(String),

    /// A gRPC status error reported by the backend.
    GrpcStatus(tonic::Status),

    /// Any other error.
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Descriptor(msg) => write!(f, "descriptor error: {msg}"),
            GatewayError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            GatewayError::Io(err) => write!(f, "I/O error: {err}"),
            GatewayError::Proto(msg) => write!(f, "proto error: {msg}"),
            GatewayError::Projection(msg) => write!(f, "projection error: {msg}"),
            GatewayError::GrpcStatus(status) => {
                write!(f, "gRPC error: {} - {}", status.code(), status.message())
            }
            GatewayError::Other(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Io(err) => Some(err),
            GatewayError::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Io(err)
    }
}

impl From<tonic::Status> for GatewayError {
    fn from(status: tonic::Status) -> Self {
        GatewayError::GrpcStatus(status)
    }
}

/// Convenience type alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formatting() {
        let err = GatewayError::Descriptor("bad verb".into());
        assert_eq!(err.to_string(), "descriptor error: bad verb");

        let err = GatewayError::Projection("no field named \"result\"".into());
        assert!(err.to_string().starts_with("projection error:"));
    }

    #[test]
    fn grpc_status_display_includes_code_and_message() {
        let err = GatewayError::GrpcStatus(tonic::Status::internal("boom"));
        let text = err.to_string();
        assert!(text.contains("Internal"), "got: {text}");
        assert!(text.contains("boom"), "got: {text}");
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: GatewayError = io_err.into();
        assert!(matches!(err, GatewayError::Io(_)));
    }

    #[test]
    fn status_conversion() {
        let err: GatewayError = tonic::Status::unavailable("backend down").into();
        assert!(matches!(err, GatewayError::GrpcStatus(_)));
    }
}
