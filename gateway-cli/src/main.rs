mod cli;

use std::net::SocketAddr;
use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use gateway_core::router::{build_gateway, GatewayOptions};
use gateway_core::{connection, descriptor};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(msg) = cli.validate() {
        eprintln!("{msg}");
        eprintln!("Try 'grpc-gateway --help' for more details.");
        process::exit(2);
    }

    // Per-request logging is emitted at debug level; --quiet drops the
    // default filter to info. RUST_LOG still overrides either.
    let default_filter = if cli.quiet { "info" } else { "debug" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let services = match descriptor::load_services(&cli.include, &cli.proto) {
        Ok(services) => services,
        Err(e) => {
            error!("failed to load service definitions: {e}");
            process::exit(1);
        }
    };

    let channel = match connection::backend_channel(&cli.backend_config(), &cli.grpc) {
        Ok(channel) => channel,
        Err(e) => {
            error!("failed to configure backend channel: {e}");
            process::exit(1);
        }
    };

    let options = GatewayOptions { debug: !cli.quiet };
    let (gateway, dispatch) = build_gateway(&services, channel, &options);
    if dispatch.is_empty() {
        error!("no HTTP bindings found in the given proto files; nothing to serve");
        process::exit(1);
    }

    let app = if cli.mountpoint == "/" {
        gateway
    } else {
        axum::Router::new().nest(&cli.mountpoint, gateway)
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {addr}: {e}");
            process::exit(1);
        }
    };

    info!(
        "Listening on http://{addr}, proxying to gRPC on {}",
        cli.grpc
    );

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        error!("server error: {e}");
        process::exit(1);
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received shutdown signal, draining");
}
