mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cli::{Cli, Commands, LibraryAction};
use mediarch::cache::ContentCache;
use mediarch::circuit::CircuitBreaker;
use mediarch::config::{self, Config};
use mediarch::orchestrator::{EnrichJobHandler, Orchestrator};
use mediarch::providers::{AdapterHarness, ProviderRegistry};
use mediarch::publish::PublishJobHandler;
use mediarch::queue::{self, JobDispatcher};
use mediarch::ratelimit::RateLimiter;
use mediarch::schedule::{self, gc, FileScanHandler, ProviderUpdateHandler};
use mediarch::select::ProviderPriority;
use mediarch_common::{JobKind, LibraryId, MediaType};
use mediarch_db::pool::{self, DbPool};
use mediarch_db::queries::{libraries, library_scheduler_config};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediarch=trace".to_string()
        } else {
            "mediarch=info".to_string()
        }
    });
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(&env_filter)).init();

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Run => rt.block_on(run(cli.config.as_deref())),
        Commands::Library { action } => rt.block_on(library_action(cli.config.as_deref(), action)),
        Commands::Scan { library_id } => rt.block_on(trigger(cli.config.as_deref(), &library_id, JobKind::FileScan)),
        Commands::Update { library_id } => {
            rt.block_on(trigger(cli.config.as_deref(), &library_id, JobKind::ProviderUpdate))
        }
        Commands::Stats => rt.block_on(stats(cli.config.as_deref())),
        Commands::TestProviders => rt.block_on(test_providers(cli.config.as_deref())),
        Commands::TestPlayers => rt.block_on(test_players(cli.config.as_deref())),
        Commands::Validate { config: config_path } => {
            let path = config_path.or(cli.config);
            validate(path.as_deref())
        }
        Commands::Version => {
            println!("mediarch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn build_registry(config: &Config) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    let rate_limiter = Arc::new(RateLimiter::with_webhook_reserved(
        Duration::from_secs(config.rate_limit.backoff_ceiling_secs),
        config.rate_limit.webhook_reserved,
    ));
    let circuit_breaker = Arc::new(CircuitBreaker::new(
        config.circuit_breaker.failure_threshold,
        Duration::from_secs(config.circuit_breaker.reset_timeout_secs),
    ));

    for provider in &config.providers {
        if !provider.enabled {
            continue;
        }
        let Some(api_key) = provider.api_key.clone() else { continue };
        match provider.name.as_str() {
            "tmdb" => {
                let adapter = mediarch::providers::tmdb::TmdbAdapter::new(api_key, provider.language.clone());
                registry.register(Arc::new(AdapterHarness::new(adapter, rate_limiter.clone(), circuit_breaker.clone())));
            }
            other => tracing::warn!(provider = other, "no adapter implemented for this provider name"),
        }
    }

    registry
}

fn build_dispatcher(pool: DbPool, cache: Arc<ContentCache>, registry: Arc<ProviderRegistry>, config: &Config) -> JobDispatcher {
    let mut dispatcher = JobDispatcher::new();
    dispatcher.register(JobKind::FileScan, Arc::new(FileScanHandler::new(pool.clone())));
    dispatcher.register(JobKind::ProviderUpdate, Arc::new(ProviderUpdateHandler::new(pool.clone())));

    let default_language = config.providers.first().map(|p| p.language.clone()).unwrap_or_else(|| "en-US".to_string());
    let orchestrator = Arc::new(Orchestrator::new(registry, ProviderPriority::quality_first()));
    dispatcher.register(
        JobKind::Enrich,
        Arc::new(EnrichJobHandler::new(pool.clone(), cache.clone(), orchestrator, default_language)),
    );
    dispatcher.register(JobKind::Publish, Arc::new(PublishJobHandler::new(pool.clone(), cache)));
    dispatcher.register(JobKind::NotifyPlayer, Arc::new(mediarch::notify::NotifyHandler::new(&config.notify.players)));

    dispatcher
}

async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let db_pool = pool::init_pool(&config.database.path.to_string_lossy())?;
    let cache = Arc::new(ContentCache::new(config.cache.root.clone()));
    let registry = Arc::new(build_registry(&config));

    queue::reclaim_stalled(&db_pool, Duration::from_secs(600))?;

    let dispatcher = Arc::new(build_dispatcher(db_pool.clone(), cache.clone(), registry, &config));
    let cancel = CancellationToken::new();

    let worker_pool = tokio::spawn(queue::run_worker_pool(
        db_pool.clone(),
        dispatcher,
        queue::WorkerPoolConfig::default(),
        cancel.clone(),
    ));
    let scheduler = tokio::spawn(schedule::run_scheduler_loop(db_pool.clone(), config.scheduler.clone(), cancel.clone()));
    let gc_loop = tokio::spawn(gc::run_gc_loop(db_pool, (*cache).clone(), config.gc.clone(), cancel.clone()));

    tracing::info!("mediarch running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    cancel.cancel();

    let _ = tokio::join!(worker_pool, scheduler, gc_loop);
    Ok(())
}

async fn library_action(config_path: Option<&Path>, action: LibraryAction) -> anyhow::Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let db_pool = pool::init_pool(&config.database.path.to_string_lossy())?;
    let conn = pool::get_conn(&db_pool)?;

    match action {
        LibraryAction::Add { name, root_path, media_type } => {
            let media_type = match media_type.as_str() {
                "movie" => MediaType::Movie,
                "tv" => MediaType::Tv,
                "music" => MediaType::Music,
                other => anyhow::bail!("unknown media type: {other}"),
            };
            let library = libraries::create_library(&conn, &name, &root_path.to_string_lossy(), media_type)?;
            library_scheduler_config::get_or_create_default(&conn, library.id)?;
            println!("created library {} ({})", library.id, library.name);
        }
        LibraryAction::List => {
            for library in libraries::list_libraries(&conn)? {
                println!("{}  {}  {}  {}", library.id, library.name, library.media_type, library.root_path);
            }
        }
        LibraryAction::Remove { library_id } => {
            let id: LibraryId = library_id.parse().map_err(|_| anyhow::anyhow!("invalid library id"))?;
            if libraries::delete_library(&conn, id)? {
                println!("removed library {id}");
            } else {
                println!("no such library: {id}");
            }
        }
    }

    Ok(())
}

async fn trigger(config_path: Option<&Path>, library_id: &str, kind: JobKind) -> anyhow::Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let db_pool = pool::init_pool(&config.database.path.to_string_lossy())?;
    let id: LibraryId = library_id.parse().map_err(|_| anyhow::anyhow!("invalid library id"))?;
    schedule::trigger_now(&db_pool, id, kind)?;
    println!("enqueued {kind} for library {id}");
    Ok(())
}

async fn stats(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let db_pool = pool::init_pool(&config.database.path.to_string_lossy())?;
    for (status, count) in queue::stats(&db_pool)? {
        println!("{status:<12} {count}");
    }
    Ok(())
}

async fn test_providers(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let registry = build_registry(&config);
    for provider in registry.all() {
        let result = provider.test_connection().await;
        println!("{:<10} {}  {}", provider.name(), if result.ok { "OK" } else { "FAILED" }, result.message);
    }
    Ok(())
}

async fn test_players(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = config::load_config_or_default(config_path)?;
    for player_config in &config.notify.players {
        if !player_config.enabled {
            continue;
        }
        let client = mediarch::notify::PlayerClient::new(player_config);
        match client.test_connection().await {
            Ok(true) => println!("{:<15} OK", client.name()),
            Ok(false) => println!("{:<15} FAILED (non-success response)", client.name()),
            Err(e) => println!("{:<15} FAILED ({e})", client.name()),
        }
    }
    Ok(())
}

fn validate(path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = config::load_config(p)?;
            println!("Configuration is valid");
            println!("  Database: {}", config.database.path.display());
            println!("  Cache root: {}", config.cache.root.display());
            println!("  Providers: {}", config.providers.len());
            println!("  Media players: {}", config.notify.players.len());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("  Database: {}", config.database.path.display());
            println!("  Cache root: {}", config.cache.root.display());
        }
    }

    Ok(())
}
