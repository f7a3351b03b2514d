//! gitdeploy - Entry Point
//!
//! Deploys changed plugin, theme and mu-plugin files from a GitHub
//! repository into a WordPress installation.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::Context;
use colored::Colorize;
use tracing::{error, info};

use gitdeploy::app::options::AppOptions;
use gitdeploy::app::run::run;
use gitdeploy::app::state::AppState;
use gitdeploy::logs::{init_logging, LogOptions};
use gitdeploy::models::deployment::{ChangeList, DeploymentStatus};
use gitdeploy::storage::layout::StorageLayout;
use gitdeploy::storage::settings::Settings;
use gitdeploy::utils::version_info;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Unable to serialize version info: {e}"),
        }
        return;
    }

    let layout = match cli_args.get("base-dir") {
        Some(dir) => StorageLayout::new(PathBuf::from(dir)),
        None => StorageLayout::default(),
    };

    // Create the storage layout and a default settings file
    if cli_args.contains_key("init") {
        match init_layout(&layout).await {
            Ok(()) => println!(
                "{} {}",
                "Initialized".green().bold(),
                layout.base_dir.display()
            ),
            Err(e) => {
                eprintln!("{} {:#}", "Init failed:".red().bold(), e);
                std::process::exit(1);
            }
        }
        return;
    }

    // Retrieve the settings file
    let settings = match layout.settings_file().read_json::<Settings>().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {e}");
            eprintln!("Run: gitdeploy --init");
            std::process::exit(1);
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level,
        file: settings.log_to_file,
        log_dir: layout.logs_dir().path().to_path_buf(),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    // Run a single deployment in the foreground
    if cli_args.contains_key("deploy") {
        let changes = cli_args
            .get("changes")
            .map(|raw| raw.split(',').map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default();
        if !deploy_once(&layout, &settings, changes).await {
            std::process::exit(1);
        }
        return;
    }

    // Run the service
    let options = AppOptions::from_settings(layout, &settings);

    info!("Running gitdeploy {} with options: {:?}", version.version, options);
    if let Err(e) = run(options, settings, await_shutdown_signal()).await {
        error!("Failed to run the agent: {e}");
        std::process::exit(1);
    }
}

async fn init_layout(layout: &StorageLayout) -> anyhow::Result<()> {
    layout
        .setup()
        .await
        .context("unable to create storage directories")?;

    let settings_file = layout.settings_file();
    if settings_file.exists().await {
        println!("Keeping existing {}", settings_file.path().display());
        return Ok(());
    }

    settings_file
        .write_json(&Settings::default())
        .await
        .context("unable to write default settings")?;
    Ok(())
}

async fn deploy_once(layout: &StorageLayout, settings: &Settings, paths: Vec<String>) -> bool {
    let options = AppOptions::from_settings(layout.clone(), settings);
    if let Err(e) = layout.setup().await {
        eprintln!("{} {}", "Unable to prepare storage:".red().bold(), e);
        return false;
    }

    let (state, _receiver) = match AppState::init(layout, settings, &options.deployer) {
        Ok(init) => init,
        Err(e) => {
            eprintln!("{} {}", "Unable to initialize:".red().bold(), e);
            return false;
        }
    };

    let changes = ChangeList::from_paths(paths, &state.self_path);
    let outcome = state.deployer.deploy(changes).await;

    let status = match outcome.status {
        DeploymentStatus::Success => outcome.status.to_string().green().bold(),
        DeploymentStatus::Failed => outcome.status.to_string().red().bold(),
    };
    println!("{} [{}] {}", status, outcome.source, outcome.id);
    if !outcome.reason.is_empty() {
        println!("  reason:  {}", outcome.reason);
    }
    println!("  changes: {}", outcome.changes);

    outcome.is_success()
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
        info!("Ctrl+C received, shutting down...");
    }
}
