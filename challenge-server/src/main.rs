use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use challenge_core::{FileModelSource, ModelCache, ModelCacheConfig, RewardCatalog, StatsCalculator};
use challenge_persistence::{
    LocalCompletionStore,
    connection::connect_and_migrate,
    repositories::{CompletionRepository, DailyChallengeRepository, SourceResultRepository},
};
use challenge_server::{
    Services, challenges::ChallengeCatalog, config::Config, create_routes,
    predictions::PredictionService, reconcile::CompletionReconciler, recorder::CompletionRecorder,
    stats_service::ChallengeStatsService,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting challenge streak server...");

    let config = match Config::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let clock = match config.day_clock() {
        Ok(clock) => clock,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let catalog = match &config.reward_catalog_path {
        Some(path) => match RewardCatalog::from_file(path) {
            Ok(catalog) => {
                info!("Loaded {} rewards from {}", catalog.rewards().len(), path);
                catalog
            }
            Err(e) => {
                error!("Failed to load reward catalog from '{}': {}", path, e);
                std::process::exit(1);
            }
        },
        None => RewardCatalog::default(),
    };

    // Initialize database connection and run migrations
    let db = match connect_and_migrate().await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to database and run migrations: {}", e);
            std::process::exit(1);
        }
    };

    let local = match LocalCompletionStore::open(&config.local_store_path, config.local_store_capacity).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(
                "Failed to open local completion store at '{}': {}",
                config.local_store_path, e
            );
            std::process::exit(1);
        }
    };

    let completions = Arc::new(CompletionRepository::new(db.clone()));
    let challenges = Arc::new(DailyChallengeRepository::new(db.clone()));
    let results = Arc::new(SourceResultRepository::new(db));

    let mut calculator = StatsCalculator::new(clock);
    if let Some(days) = config.history_window_days {
        calculator = calculator.with_history_window(days);
    }

    let model_cache = ModelCache::new(
        ModelCacheConfig {
            capacity: config.model_cache_capacity,
            base_location: config.model_base_path.clone(),
        },
        Box::new(FileModelSource),
    );

    let services = Services {
        recorder: Arc::new(CompletionRecorder::new(
            completions.clone(),
            challenges.clone(),
            results.clone(),
            local.clone(),
        )),
        stats: Arc::new(
            ChallengeStatsService::new(
                completions.clone(),
                local.clone(),
                Arc::new(catalog),
                calculator,
            )
            .with_mirror(local.clone())
            .with_fetch_timeout(config.stats_fetch_timeout())
            .with_window_days(config.stats_window_days),
        ),
        reconciler: Arc::new(CompletionReconciler::new(
            completions,
            challenges.clone(),
            results,
            local,
        )),
        catalog: Arc::new(ChallengeCatalog::new(challenges.clone(), clock)),
        challenge_repository: challenges,
        predictions: Arc::new(PredictionService::new(
            model_cache,
            config.model_default_version.clone(),
        )),
    };

    let routes = create_routes(services);

    info!("Server starting on {}:{}", config.host, config.port);

    let ip = match config.host.parse::<std::net::IpAddr>() {
        Ok(ip) => ip,
        Err(e) => {
            error!("Invalid HOST '{}': {}", config.host, e);
            std::process::exit(1);
        }
    };

    let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown((ip, config.port), async {
        // Wait for SIGINT (Ctrl+C) or SIGTERM
        #[cfg(unix)]
        {
            let (mut sigint, mut sigterm) = match (
                signal::unix::signal(signal::unix::SignalKind::interrupt()),
                signal::unix::signal(signal::unix::SignalKind::terminate()),
            ) {
                (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                _ => {
                    error!("Failed to install signal handlers, running until killed");
                    std::future::pending::<()>().await;
                    return;
                }
            };

            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for ctrl+c: {}", e);
                return;
            }
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    });

    info!(
        "Server started successfully on {}. Press Ctrl+C to stop.",
        addr
    );
    server.await;
    info!("Server shutdown complete.");
}
