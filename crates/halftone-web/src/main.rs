use std::path::PathBuf;
use std::sync::Arc;

use facet::Facet;
use figue as args;
use halftone_runtime::{
    BlobCleanupHandler, BlobStore, Dispatcher, GenerationHandler, GraphStore, MemoryBlobStore,
    MemoryGraphStore, NotificationHandler, Notifier, PassthroughGenerator, PropagationHandler,
};
use halftone_web::app::{build_router, AppState};
use halftone_web::db::{init_sqlite, Db, SqliteBlobStore, SqliteGraphStore};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Facet, Debug)]
struct ServerCli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    /// Keep all state in memory instead of SQLite (demos, tests).
    #[facet(args::named, default)]
    ephemeral: bool,
}

fn main() {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async {
            if let Err(err) = run_server().await {
                eprintln!("{err}");
                std::process::exit(1);
            }
        });
}

async fn run_server() -> Result<(), String> {
    let cli = parse_server_cli()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let http_addr = std::env::var("HALFTONE_HTTP").unwrap_or_else(|_| "127.0.0.1:9150".into());
    let db_path =
        PathBuf::from(std::env::var("HALFTONE_DB").unwrap_or_else(|_| "halftone.sqlite".into()));

    let (store, blobs): (Arc<dyn GraphStore>, Arc<dyn BlobStore>) = if cli.ephemeral {
        info!("halftone-web running with in-memory state");
        (
            Arc::new(MemoryGraphStore::new()),
            Arc::new(MemoryBlobStore::new()),
        )
    } else {
        let db = Arc::new(Db::new(db_path));
        init_sqlite(&db).map_err(|e| format!("failed to init sqlite at {:?}: {e}", db.path()))?;
        info!(db_path = %db.path().display(), "halftone-web sqlite ready");
        (
            Arc::new(SqliteGraphStore::new(db.clone())),
            Arc::new(SqliteBlobStore::new(db)),
        )
    };

    let notifier = Arc::new(Notifier::new());
    let dispatcher = Dispatcher::new(store.clone());
    dispatcher.register_handler(Arc::new(PropagationHandler));
    dispatcher.register_handler(Arc::new(GenerationHandler::new(Arc::new(
        PassthroughGenerator::new(blobs.clone()),
    ))));
    dispatcher.register_handler(Arc::new(BlobCleanupHandler::new(
        store.clone(),
        blobs.clone(),
    )));
    dispatcher.register_handler(Arc::new(NotificationHandler::new(notifier.clone())));

    let state = AppState::new(dispatcher, store, blobs, notifier);

    let http_listener = TcpListener::bind(&http_addr)
        .await
        .map_err(|e| format!("failed to bind HTTP on {http_addr}: {e}"))?;
    info!(%http_addr, "halftone-web HTTP API ready");
    print_startup_hints(&http_addr, cli.ephemeral);

    let app = build_router(state);
    axum::serve(http_listener, app)
        .await
        .map_err(|e| format!("HTTP server error: {e}"))
}

fn parse_server_cli() -> Result<ServerCli, String> {
    let figue_config = args::builder::<ServerCli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("halftone")
                .description("SQLite-backed image graph engine + live event API")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();
    let cli = args::Driver::new(figue_config)
        .run()
        .into_result()
        .map_err(|e| e.to_string())?;
    Ok(cli.value)
}

fn print_startup_hints(http_addr: &str, ephemeral: bool) {
    let mode = if ephemeral { "in-memory" } else { "sqlite" };
    println!();
    println!("  halftone-web ready ({mode})");
    println!();
    println!("  \x1b[32mAPI base: http://{http_addr}/api\x1b[0m");
    println!("  Node type schemas: http://{http_addr}/api/node-types");
    println!("  Live events: ws://{http_addr}/api/graphs/<graph-id>/events");
    println!();
}
