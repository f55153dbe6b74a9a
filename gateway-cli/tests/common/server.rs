// See mod.rs for why this is needed.
#![allow(dead_code)]

use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// A demo gRPC backend plus a gateway proxying to it, both on ephemeral
/// ports. The processes are killed when this struct is dropped.
pub struct GatewayStack {
    backend: Child,
    gateway: Child,
    pub gateway_port: u16,
    pub backend_addr: String,
}

impl GatewayStack {
    /// Start the backend and a gateway with default flags.
    pub fn start() -> Self {
        Self::start_with_args(&[])
    }

    /// Start the backend and a gateway with extra gateway flags (e.g. a
    /// mountpoint).
    ///
    /// Panics if either process fails to start or its port is not ready
    /// within 10s.
    pub fn start_with_args(extra_args: &[&str]) -> Self {
        let backend_port = find_free_port();
        let backend_addr = format!("localhost:{backend_port}");

        let backend = Command::new(backend_bin())
            .args(["-p", &backend_port.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to start greeterdemo backend");
        wait_for_port(backend_port, Duration::from_secs(10));

        let gateway_port = find_free_port();
        let proto_dir = super::proto_dir();
        let mut args = vec![
            "-p".to_string(),
            gateway_port.to_string(),
            "-g".to_string(),
            backend_addr.clone(),
            "-I".to_string(),
            proto_dir,
        ];
        args.extend(extra_args.iter().map(|a| a.to_string()));
        args.push("demo.proto".to_string());

        let gateway = Command::new(super::gateway_bin())
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to start grpc-gateway");
        wait_for_port(gateway_port, Duration::from_secs(10));

        GatewayStack {
            backend,
            gateway,
            gateway_port,
            backend_addr,
        }
    }

    /// Base URL of the running gateway.
    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.gateway_port, path)
    }
}

impl Drop for GatewayStack {
    fn drop(&mut self) {
        let _ = self.gateway.kill();
        let _ = self.gateway.wait();
        let _ = self.backend.kill();
        let _ = self.backend.wait();
    }
}

/// Find the greeterdemo binary path.
fn backend_bin() -> std::path::PathBuf {
    // greeterdemo is a workspace member, so Cargo builds it in the same
    // target directory. We derive the path from the gateway binary location.
    let gateway = super::gateway_bin();
    let target_dir = gateway.parent().expect("gateway binary has no parent dir");
    target_dir.join("greeterdemo")
}

/// Bind to port 0 to get an ephemeral port from the OS.
fn find_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind ephemeral port");
    listener.local_addr().unwrap().port()
}

/// Wait for a TCP port to accept connections, or panic after timeout.
fn wait_for_port(port: u16, timeout: Duration) {
    let start = Instant::now();
    loop {
        if TcpStream::connect_timeout(
            &format!("127.0.0.1:{port}").parse().unwrap(),
            Duration::from_millis(100),
        )
        .is_ok()
        {
            return;
        }
        if start.elapsed() > timeout {
            panic!("Timed out waiting for port {port}");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}
