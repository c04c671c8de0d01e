//! obsmcp
//!
//! Streamable HTTP MCP server exposing FHIR Observation search.

use std::future::IntoFuture;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use obsmcp_core::config::Settings;
use obsmcp_core::secrets::{ChainSecretStore, EnvSecretStore, SecretStore};
use obsmcp_server::{app, build_router, init_logging, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let (mut settings, source) = Settings::resolve(&cli.config_providers()?)?;
    cli.apply(&mut settings);
    settings.validate()?;

    let secrets = ChainSecretStore::new(vec![
        Arc::new(cli.secret_store()?) as Arc<dyn SecretStore>,
        Arc::new(EnvSecretStore::new()),
    ]);
    let router = Arc::new(build_router(&settings, &secrets)?);

    let addr = settings.transport.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        path = %settings.transport.path,
        fhir = %settings.fhir.base_url,
        role = %settings.credentials.role,
        settings = %source,
        "obsmcp listening"
    );

    let server = axum::serve(listener, app(router, &settings.transport.path));
    tokio::select! {
        result = server.into_future() => result?,
        _ = shutdown_signal() => info!("Shutdown signal received, exiting"),
    }

    Ok(())
}

/// Resolves on SIGINT or SIGTERM; sessions are not drained
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
