//! async-messaging service entry point.
//!
//! Wires configuration, the Postgres ledger, the Redis Streams broker, the
//! relay handler and the HTTP API, then serves until Ctrl-C or SIGTERM.

use std::error::Error;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use async_messaging::adapters::events::{LoggingEventHandler, QueueConsumer, RedisStreamBroker};
use async_messaging::adapters::http::{api_router, EventsAppState, HealthAppState};
use async_messaging::adapters::postgres::PostgresEventLedger;
use async_messaging::application::RelayEventHandler;
use async_messaging::config::{AppConfig, ServerConfig};
use async_messaging::ports::{EventLedger, MessageBroker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config.server)?;

    // ---- Ledger ----
    let pool = config
        .database
        .pool_options()
        .connect_with(config.database.connect_options()?)
        .await?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");
    }

    let ledger: Arc<dyn EventLedger> = Arc::new(PostgresEventLedger::new(pool.clone()));

    // ---- Broker ----
    let broker: Arc<dyn MessageBroker> = Arc::new(
        RedisStreamBroker::connect(&config.broker.url, config.broker.stream_config()).await?,
    );

    let relay = Arc::new(RelayEventHandler::new(Arc::clone(&ledger), Arc::clone(&broker)));

    // ---- Shutdown ----
    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let consumer = if config.broker.consume_enabled {
        let consumer = QueueConsumer::new(
            Arc::clone(&broker),
            config.broker.queue.clone(),
            Arc::new(LoggingEventHandler),
        );
        let cancel = shutdown.child_token();
        Some(tokio::spawn(async move { consumer.run(cancel).await }))
    } else {
        None
    };

    // ---- HTTP ----
    let router = api_router(
        EventsAppState::new(relay),
        HealthAppState::new(ledger),
        config.server.request_timeout(),
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, queue = %config.broker.queue, "Listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await?;

    // A signal may not have fired if the server stopped on its own.
    shutdown.cancel();
    if let Some(consumer) = consumer {
        match consumer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Consumer stopped with error"),
            Err(e) => tracing::error!(error = %e, "Consumer task panicked"),
        }
    }

    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(server: &ServerConfig) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&server.log_level))?;

    if server.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact().with_target(true))
            .try_init()?;
    }
    Ok(())
}

async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }

    shutdown.cancel();
}
