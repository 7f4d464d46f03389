use std::net::SocketAddr;

use tracing::{info, warn};

use child_collections::config::Config;
use child_collections::server::{self, AppState};
use child_collections::{build_schema, store, telemetry, AssociationResolver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- Config ---
    let cfg = Config::load("config/config.yaml")?;
    cfg.validate()?;

    // --- Logging ---
    telemetry::init_logger(&cfg.observability.log)?;

    info!(
        app_name = %cfg.app.name,
        version = %cfg.app.version,
        environment = %cfg.app.environment,
        "starting child-collections server"
    );

    // --- Entity Store ---
    let store = store::open(&cfg.store).await?;
    if let Err(err) = store.ping().await {
        warn!(error = %err, "entity store not reachable yet");
    }

    // --- Schema / Router ---
    let resolver = AssociationResolver::new(store.clone());
    let schema = build_schema(resolver, &cfg.graphql);
    let state = AppState::new(schema, store.clone(), &cfg.graphql);
    let app = server::router(state);

    let host: std::net::IpAddr = cfg.server.host.parse()?;
    let addr = SocketAddr::new(host, cfg.server.port);
    info!(%addr, graphiql = cfg.graphql.graphiql, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(err) = store.close().await {
        warn!(error = %err, "failed to close entity store");
    }
    info!("child-collections exited");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
