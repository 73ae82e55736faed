use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use scout::{
    AppState, InMemoryKnowledgeStore, KnowledgeStore, ResearchEngine, ScoutConfig,
    ScoutConfigManager,
    cli::{
        Cli, Commands, QueryArgs,
        init::{self, InitConfig, InitResult},
        output::Output,
    },
    types::ResearchRequest,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Err(e) = run(cli, &output).await {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    match cli.command {
        Some(Commands::Init {
            path,
            force,
            no_examples,
            host,
            port,
        }) => {
            let config = InitConfig {
                path,
                force,
                no_examples,
                host,
                port,
            };
            match init::run(config, output) {
                InitResult::Success | InitResult::AlreadyExists => Ok(()),
                InitResult::Error(e) => anyhow::bail!("init failed: {}", e),
            }
        }
        Some(Commands::Config { validate }) => {
            let manager = ScoutConfigManager::new(&cli.config)?;
            show_config(&manager, validate, output)
        }
        Some(Commands::Plan { query, json }) => {
            let manager = load_config(&cli.config, false)?;
            init_tracing(&manager.config().server.log_level, cli.verbose, cli.log_json);
            let store = open_store(&manager.config())?;
            let engine = ResearchEngine::from_config(Arc::new(manager), store)?;

            let tree = engine.plan(&request(query, None))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                output.task_tree(&tree);
            }
            Ok(())
        }
        Some(Commands::Research {
            query,
            budget,
            json,
        }) => {
            let manager = load_config(&cli.config, true)?;
            init_tracing(&manager.config().server.log_level, cli.verbose, cli.log_json);
            let config = manager.config();
            let store = open_store(&config)?;
            let engine = ResearchEngine::from_config(Arc::new(manager), store.clone())?;

            let result = engine.research(request(query, budget)).await?;
            save_snapshot(&store, &config);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                output.report(&result);
            }
            Ok(())
        }
        Some(Commands::Serve) | None => serve(&cli, output).await,
    }
}

fn request(args: QueryArgs, budget: Option<u64>) -> ResearchRequest {
    ResearchRequest {
        max_depth: args.depth,
        max_fanout: args.fanout,
        region_filter: (!args.regions.is_empty()).then_some(args.regions),
        time_budget_seconds: budget,
        ..ResearchRequest::new(args.query)
    }
}

/// Load the config file; `plan` can run on defaults when there is none.
fn load_config(path: &Path, required: bool) -> anyhow::Result<ScoutConfigManager> {
    if !required && !path.exists() {
        return Ok(ScoutConfigManager::from_config(ScoutConfig::default()));
    }
    ScoutConfigManager::new(path).with_context(|| {
        format!(
            "cannot load {} (run `ee-scout init` to create one)",
            path.display()
        )
    })
}

fn init_tracing(log_level: &str, verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { log_level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},scout={}", level, level)));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

fn open_store(config: &ScoutConfig) -> anyhow::Result<Arc<InMemoryKnowledgeStore>> {
    let store = InMemoryKnowledgeStore::new(config.cache.clone(), config.store.metric()?);
    if let Some(path) = &config.store.snapshot_path {
        let loaded = store
            .load_from(path)
            .with_context(|| format!("cannot load snapshot {}", path.display()))?;
        if loaded {
            info!(
                path = %path.display(),
                entities = store.entity_count(),
                relationships = store.relationship_count(),
                "Knowledge store restored"
            );
        }
    }
    Ok(Arc::new(store))
}

fn save_snapshot(store: &InMemoryKnowledgeStore, config: &ScoutConfig) {
    let Some(path) = &config.store.snapshot_path else {
        return;
    };
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %parent.display(), error = %e, "Cannot create snapshot directory");
            return;
        }
    }
    match store.save_to(path) {
        Ok(()) => info!(path = %path.display(), "Knowledge store snapshot written"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to write snapshot"),
    }
}

fn show_config(manager: &ScoutConfigManager, validate: bool, output: &Output) -> anyhow::Result<()> {
    let config = manager.config();

    output.header("Configuration");
    output.kv("file", &manager.path().display().to_string());
    output.kv(
        "server",
        &format!("{}:{}", config.server.host, config.server.port),
    );
    output.kv(
        "planner",
        &format!(
            "depth {} (max {}), fan-out {} (max {})",
            config.planner.default_max_depth,
            config.planner.max_depth_limit,
            config.planner.default_max_fanout,
            config.planner.max_fanout_limit
        ),
    );
    output.kv(
        "orchestrator",
        &format!(
            "{} concurrent, {}s per task, {}s per tree, {} retries",
            config.orchestrator.max_concurrent_tasks,
            config.orchestrator.task_timeout_secs,
            config.orchestrator.tree_timeout_secs,
            config.orchestrator.max_retries
        ),
    );
    output.kv(
        "cache",
        &if config.cache.enabled {
            format!("{} entries, ttl {}s", config.cache.max_entries, config.cache.ttl_secs)
        } else {
            "disabled".to_string()
        },
    );

    output.subheader("Sources");
    if config.sources.is_empty() {
        output.info("none configured");
    }
    for (key, source) in &config.sources {
        output.kv(key, &format!("{:?}", source));
    }

    if validate {
        output.subheader("Validation");
        let warnings = config.validate_with_warnings()?;
        if warnings.is_empty() {
            output.success("Configuration is valid");
        }
        for warning in warnings {
            output.warning(&warning.to_string());
        }
    }
    Ok(())
}

async fn serve(cli: &Cli, output: &Output) -> anyhow::Result<()> {
    let mut manager = load_config(&cli.config, true)?;
    let config = manager.config();
    init_tracing(&config.server.log_level, cli.verbose, cli.log_json);
    output.banner();

    if let Err(e) = manager.start_watching() {
        warn!(error = %e, "Config hot reload unavailable");
    }
    let manager = Arc::new(manager);

    let store = open_store(&config)?;
    let shared: Arc<dyn KnowledgeStore> = store.clone();
    let engine = ResearchEngine::from_config(manager.clone(), shared.clone())?;

    let state = AppState {
        config_manager: manager,
        engine: Arc::new(engine),
        store: shared,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", scout::api::routes::create_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    info!(addr = %addr, "ee-scout API listening");
    output.info(&format!("Listening on http://{}/api", addr));

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await?;

    save_snapshot(&store, &config);
    Ok(())
}
