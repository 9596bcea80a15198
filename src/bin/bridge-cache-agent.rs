use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use bridge_cache_agent::cache::resource_cache::ResourceCache;
use bridge_cache_agent::cache::subscriber::LogSubscriber;
use bridge_cache_agent::gateway::http_gateway::HttpGateway;
use bridge_cache_agent::resources::urls::{resolve_resources, ReadMode};
use bridge_cache_agent::scheduler::refresh_loop::RefreshScheduler;
use bridge_cache_agent::server;
use bridge_cache_agent::sinks::sink_file::RefreshTokenFile;
use bridge_cache_agent::utils::config_loader;
use bridge_cache_agent::utils::logging;
use bridge_cache_agent::utils::logging::LogLevel;
use clap::Parser;
use reqwest::Client;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "bridge-cache-agent.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level)?;

    // -------------------------------
    // 2. Gateway, restoring a persisted refresh token
    // -------------------------------

    let client = Client::builder()
        .timeout(Duration::from_millis(service_config.settings.timeout_ms))
        .build()?;
    let gateway = Arc::new(HttpGateway::new(client, &service_config)?);

    let token_file = service_config
        .credentials
        .refresh_token_path
        .as_ref()
        .map(RefreshTokenFile::new);

    if let Some(file) = &token_file {
        if service_config.credentials.refresh_token.is_empty() {
            if let Some(restored) = file.read().await? {
                info!("refresh token restored from '{}'", file.path().display());
                gateway
                    .set_credentials(&service_config.credentials.authorization_code, &restored)
                    .await;
            }
        }
    }

    // -------------------------------
    // 3. Resolve resources, subscribe the cached ones
    // -------------------------------

    let resources = resolve_resources(&service_config).map_err(|e| anyhow!("{}", e))?;
    let cache = Arc::new(ResourceCache::new(gateway.clone()));

    for resource in resources.values().filter(|r| r.read_mode == ReadMode::Cached) {
        let subscriber = Arc::new(LogSubscriber::new(&resource.id));
        if let Err(e) = cache.subscribe(subscriber, &resource.url).await {
            warn!("resource '{}' not subscribed ({:?}): {}", resource.id, e.status(), e);
        }
    }

    // -------------------------------
    // 4. Workers: refresh loop, token file, http server
    // -------------------------------

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = RefreshScheduler::new(
        cache.clone(),
        Duration::from_secs(service_config.settings.refresh_interval_seconds),
    )
    .run(shutdown_rx.clone());

    let refresh_token_rx = gateway.watch_refresh_token();
    let sink_shutdown = shutdown_rx.clone();
    let token_sink = async move {
        match token_file {
            Some(file) => file.run(refresh_token_rx, sink_shutdown).await,
            None => Ok(()),
        }
    };

    let http_server = server::server::start(
        &service_config.settings,
        cache.clone(),
        resources,
        shutdown_rx,
    );

    let signals = {
        let gateway = gateway.clone();
        async move {
            wait_for_signal().await?;
            info!("shutdown requested");
            gateway.reset_access_token().await;
            shutdown_tx.send_replace(true);
            Ok::<(), anyhow::Error>(())
        }
    };

    info!("Service starting...");
    tokio::try_join!(scheduler, http_server, token_sink, signals)?;

    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}
