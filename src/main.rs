use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use photopin::file_input::{collect_paths, load_blobs};
use photopin::geo::Coordinate;
use photopin::server::{start_server, AppState, LocationSource};
use photopin::settings::Settings;
use photopin::utils::open_browser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Photo files or folders to load right away
    paths: Vec<PathBuf>,

    /// Port for the local web page
    #[arg(short, long, env = "PHOTOPIN_PORT")]
    port: Option<u16>,

    /// Use a fixed location (LAT,LNG) instead of asking the browser
    #[arg(long, value_name = "LAT,LNG")]
    location: Option<Coordinate>,

    /// Never ask for a location; photos go to the default location
    #[arg(long, conflicts_with = "location")]
    no_geolocation: bool,

    /// Open the page in the default browser
    #[arg(long)]
    open: bool,

    /// Verbose logging and extra state in /api/state
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default = if debug { "photopin=debug" } else { "photopin=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load().context("Failed to load settings")?;
    if !Settings::config_path().exists() {
        // First run: leave an editable config behind
        if let Err(e) = settings.save() {
            eprintln!("⚠️  Could not write default config: {}", e);
        }
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    settings.debug_mode |= args.debug;
    settings.auto_open_browser |= args.open;

    init_tracing(settings.debug_mode);

    println!("📍 PhotoPin v{} starting...", env!("CARGO_PKG_VERSION"));
    println!("   ⚙️  Config: {}", Settings::config_path().display());

    let source = match (args.location, args.no_geolocation) {
        (Some(coordinate), _) => {
            println!("   📌 Using fixed location {}", coordinate);
            LocationSource::Fixed(coordinate)
        }
        (None, true) => {
            println!("   🚫 Geolocation disabled, photos go to {}", settings.default_location);
            LocationSource::Disabled
        }
        (None, false) => LocationSource::Browser,
    };

    let port = settings.port;
    let auto_open = settings.auto_open_browser;
    let max_file_size = settings.max_file_size;
    let state = AppState::new(settings, source);

    if !args.paths.is_empty() {
        let paths = collect_paths(&args.paths)?;
        let blobs = load_blobs(&paths, max_file_size);
        println!("   📸 Loading {} file(s) from the command line", blobs.len());
        let session = state.session.clone();
        tokio::spawn(async move {
            let report = session.handle_files(blobs).await;
            tracing::info!(committed = report.committed.len(), rejected = report.rejected.len(), "initial batch finished");
        });
    }

    let url = format!("http://127.0.0.1:{}", port);
    if auto_open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!(error = %e, "could not open the browser");
            println!("   🌐 Open {} in your browser", url);
        }
    } else {
        println!("   🌐 Open {} in your browser", url);
    }

    start_server(state, port).await
}
