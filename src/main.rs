use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod catalog;
mod cli;
mod client;
mod credentials;
mod gateway;
mod gui;
mod router;
mod screens;
mod session;
mod settings;
mod theme;

use api::HttpTransport;
use client::ClientCore;
use credentials::{CredentialStore, FileStore};
use gateway::RequestGateway;
use settings::{
    credentials_path, default_base_path, ensure_base_folders, load_or_init_settings,
    save_settings,
};

#[derive(Parser, Debug)]
#[command(
    name = "project-k",
    version,
    about = "Project K learning client (students and teachers)"
)]
struct CliArgs {
    /// Choose GUI (default) or CLI mode
    #[arg(long, value_enum, default_value = "gui")]
    mode: RunMode,
    /// Override data base path (defaults to ./data next to the exe)
    #[arg(long)]
    base_path: Option<PathBuf>,
    /// Backend base URL, e.g. http://localhost:8001
    #[arg(long)]
    api_url: Option<String>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RunMode {
    Gui,
    Cli,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("project_k=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logging();
    let args = CliArgs::parse();
    let base_path = args.base_path.unwrap_or_else(default_base_path);

    if let Err(e) = ensure_base_folders(&base_path) {
        eprintln!(
            "Failed to create base folders at {}: {}",
            base_path.display(),
            e
        );
        return;
    }

    let mut settings = match load_or_init_settings(&base_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            return;
        }
    };
    settings.base_path = base_path.to_string_lossy().to_string();
    settings.mode = match args.mode {
        RunMode::Gui => "gui".to_string(),
        RunMode::Cli => "cli".to_string(),
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return;
        }
    };

    let api_base = settings.resolve_api_base(args.api_url.as_deref());
    let gateway = RequestGateway::global();
    let timeout = Duration::from_secs(settings.request_timeout_secs.max(1));
    let transport = match HttpTransport::new(api_base, gateway.clone(), timeout) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to build HTTP client: {}", e);
            return;
        }
    };
    info!(data = %base_path.display(), api = transport.base_url(), "starting");

    let store = CredentialStore::new(FileStore::open(credentials_path(&base_path)));
    let mut core = ClientCore::new(store, gateway, Arc::new(transport), runtime.handle().clone());
    core.bootstrap();

    // The GUI saves its own copy on theme changes.
    if let Err(e) = save_settings(&settings, &base_path) {
        eprintln!("Could not save settings: {}", e);
    }

    match args.mode {
        RunMode::Gui => {
            if let Err(e) = gui::launch_gui(core, base_path, settings) {
                eprintln!("Failed to start GUI: {}", e);
            }
        }
        RunMode::Cli => {
            cli::run_cli(&mut core, &runtime, settings.register_endpoint);
        }
    }
}
