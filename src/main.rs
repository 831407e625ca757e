mod admin_api;
mod align;
mod client;
mod config;
mod domain;
mod errors;
mod locate;
mod storage;
mod suppression;
mod sync_api;
mod sync_engine;
mod textnorm;
mod transcribe;
mod translate;
mod trigger;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use client::abs::AbsClient;
use client::booklore::BookloreClient;
use client::hardcover::HardcoverClient;
use client::kosync::KoSyncClient;
use client::storyteller::StorytellerClient;
use client::Client;
use config::Config;
use migration::MigratorTrait;
use poem::{
    EndpointExt, Route, Server,
    listener::TcpListener,
    middleware::{Cors, Tracing as PoemTracing},
};
use poem_openapi::OpenApiService;
use sea_orm::Database;
use storage::Store;
use suppression::SuppressionTracker;
use sync_engine::SyncEngine;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};
use transcribe::{JobManager, NullTranscriber, TranscriptStore};

type AbsKoboResult<T> = anyhow::Result<T>;

#[tokio::main]
async fn main() -> AbsKoboResult<()> {
    let default_filter = format!(
        "{}=info,poem=info,reqwest=warn,h2=warn",
        env!("CARGO_PKG_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting ABS sync bridge"
    );

    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    }

    let config = Config::load().map_err(|e| anyhow::anyhow!(e))?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;
    let config = Arc::new(config);

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data_dir {}", config.data_dir))?;

    let db_conn = Database::connect(config.db_connection_string())
        .await
        .with_context(|| "failed to connect to database")?;
    migration::Migrator::up(&db_conn, None)
        .await
        .with_context(|| "failed to run database migrations")?;
    let db_conn = Arc::new(db_conn);

    let store = Arc::new(Store::new(db_conn.clone()));
    let suppression = Arc::new(SuppressionTracker::new(config.suppression_ttl_seconds));
    let transcripts = Arc::new(
        TranscriptStore::new(&config.data_dir, config.parsed_ebook_cache_capacity)
            .with_context(|| "creating transcript store")?,
    );

    let abs = Arc::new(
        AbsClient::new(&config.abs_base_url)
            .context("building ABS client")?
            .with_api_key(&config.abs_api_key)
            .with_transcript_store(transcripts.clone()),
    );

    let clients: Vec<Arc<dyn Client>> = vec![
        abs.clone(),
        Arc::new(
            KoSyncClient::new(&config.kosync_base_url)
                .context("building KOSync client")?
                .with_credentials(&config.kosync_username, &config.kosync_userkey),
        ),
        Arc::new(
            StorytellerClient::new(&config.storyteller_base_url)
                .context("building Storyteller client")?
                .with_credentials(&config.storyteller_username, &config.storyteller_password),
        ),
        Arc::new(
            BookloreClient::new(&config.booklore_base_url)
                .context("building Booklore client")?
                .with_api_token(&config.booklore_api_token),
        ),
        Arc::new(
            HardcoverClient::new(&config.hardcover_base_url)
                .context("building Hardcover client")?
                .with_api_token(&config.hardcover_api_token),
        ),
    ];

    let jobs = Arc::new(JobManager::new(
        db_conn.clone(),
        transcripts.clone(),
        Arc::new(NullTranscriber),
        config.job_max_retries,
        config.job_retry_delay_minutes,
    ));

    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        suppression.clone(),
        clients.clone(),
        config.clone(),
    ));

    let sync_tx = trigger::spawn(
        engine.clone(),
        store.clone(),
        clients.clone(),
        Some(abs.clone()),
        config.clone(),
    );

    run_servers(store, abs, jobs, sync_tx, config).await
}

async fn run_servers(
    store: Arc<Store>,
    abs: Arc<AbsClient>,
    jobs: Arc<JobManager>,
    sync_tx: tokio::sync::mpsc::UnboundedSender<String>,
    config: Arc<Config>,
) -> AbsKoboResult<()> {
    let version = env!("CARGO_PKG_VERSION");

    let admin_api = admin_api::AdminApi {
        abs,
        store: store.clone(),
        jobs,
        data_dir: config.data_dir.clone(),
    };
    let admin_service =
        OpenApiService::new(admin_api, "ABS Sync Bridge Admin API", version)
            .server(format!("http://localhost:{}", config.kosync_primary_port));
    let admin_ui = admin_service.rapidoc();
    let admin_spec = admin_service.spec();
    let admin_route = Route::new()
        .nest("/", admin_service)
        .nest("/ui", admin_ui)
        .nest("/spec", poem::endpoint::make_sync(move |_| admin_spec.clone()))
        .with(Cors::new())
        .with(PoemTracing);

    let sync_api = sync_api::SyncApi {
        store,
        enqueue: sync_tx,
    };
    let sync_service = OpenApiService::new(sync_api, "ABS Sync Bridge KoSync API", version)
        .server(format!("http://localhost:{}", config.kosync_sync_port));
    let sync_route = Route::new()
        .nest("/", sync_service)
        .with(PoemTracing);

    let admin_addr = format!("0.0.0.0:{}", config.kosync_primary_port);
    let sync_addr = format!("0.0.0.0:{}", config.kosync_sync_port);
    tracing::info!(%admin_addr, %sync_addr, "starting HTTP servers");

    let admin_server = Server::new(TcpListener::bind(admin_addr)).run(admin_route);
    let sync_server = Server::new(TcpListener::bind(sync_addr)).run(sync_route);

    tokio::try_join!(admin_server, sync_server)?;
    Ok(())
}
