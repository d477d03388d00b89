//! FallDetect: image classification service for fallen-person detection.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod error;
mod evaluate;
mod routes;
mod state;

use falldetect_infer::{HttpVisionBackend, ResourceGate};
use falldetect_store::SqliteFingerprintCache;
use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("FALLDETECT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--evaluate" | "evaluate" => {
                if args.len() < 3 {
                    eprintln!("Usage: falldetect evaluate <image-dir>");
                    std::process::exit(1);
                }
                let config = falldetect_core::ServiceConfig::from_env(resolve_data_dir())?;
                let report = evaluate::run(&PathBuf::from(&args[2]), config.vision).await?;
                evaluate::print_report(&report);
                std::process::exit(if report.failures() == 0 { 0 } else { 1 });
            }
            "--help" | "-h" | "help" => {
                println!("FallDetect: fallen-person image classification service");
                println!();
                println!("Usage: falldetect [command]");
                println!();
                println!("Commands:");
                println!("  (none)                   Start the server");
                println!("  evaluate <image-dir>     Score labelled images (_0_ / _1_ in filenames)");
                println!("  help                     Show this help message");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'falldetect help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = falldetect_core::ServiceConfig::from_env(&data_dir)?;
    let port = config.port;

    let cache = SqliteFingerprintCache::open(&config.data_paths.db)
        .map_err(|e| anyhow::anyhow!("Failed to open cache: {}", e))?;
    let gate = Arc::new(ResourceGate::new());

    let state = Arc::new(AppState::new(config, Arc::new(cache), gate.clone()));

    // Requests are refused with 503 until the backend is installed.
    let vision = state.config.vision.clone();
    tokio::spawn(async move {
        info!("Connecting to vision backend at {}", vision.endpoint);
        match HttpVisionBackend::connect(vision).await {
            Ok(backend) => match gate.install(Box::new(backend)) {
                Ok(()) => info!("Vision backend ready"),
                Err(e) => error!("Failed to install vision backend: {}", e),
            },
            Err(e) => error!("Vision backend unavailable: {}", e),
        }
    });

    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("FallDetect server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
