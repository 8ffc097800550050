//! `idseal` — identifier protection service entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Build the [`IdentifierCodec`]; a missing or wrong-length key aborts here.
//! 3. Initialise the telemetry pipeline.
//! 4. Build the Axum router over an in-memory identifier store.
//! 5. Serve HTTPS when TLS paths are configured, plain HTTP otherwise.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use idseal::config::Config;
use idseal::server::{self, state::AppState};
use idseal::{telemetry, IdentifierCodec, InMemoryIdentifierStore};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Codec
    // -----------------------------------------------------------------------
    let codec = IdentifierCodec::from_config(&cfg).map_err(|e| {
        eprintln!("ERROR: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 3. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.listen_port,
        fingerprint_mode = codec.fingerprint_mode(),
        "idseal starting"
    );

    // -----------------------------------------------------------------------
    // 4. Router
    // -----------------------------------------------------------------------
    let state = AppState::new(codec, Arc::new(InMemoryIdentifierStore::new()));
    let router = server::router::build(state);

    // -----------------------------------------------------------------------
    // 5. Listener
    // -----------------------------------------------------------------------
    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    match cfg.tls_paths() {
        Some((cert_path, key_path)) => {
            let tls_config = server::tls::load_server_config(cert_path, key_path)?;
            info!(addr = %addr, "listening (https)");
            server::tls::serve(listener, router, tls_config).await
        }
        None => {
            info!(addr = %addr, "listening (http)");
            axum::serve(listener, router).await?;
            Ok(())
        }
    }
}
