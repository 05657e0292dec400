use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use soundalike_audio::{scan_library, MfccExtractor};
use soundalike_common::{logger, AppConfig};
use soundalike_vector::{build_catalog, Catalog};
use std::path::PathBuf;
use std::sync::Arc;

/// Find project root by looking for .git directory
fn find_project_root() -> Option<PathBuf> {
    let mut current_dir = std::env::current_dir().ok()?;

    loop {
        if current_dir.join(".git").exists() {
            return Some(current_dir);
        }

        if !current_dir.pop() {
            break;
        }
    }

    None
}

/// Load .env file from project root
fn load_dotenv_from_project_root() {
    if let Some(root) = find_project_root() {
        let env_path = root.join(".env");
        if env_path.exists() {
            dotenv::from_path(&env_path).ok();
        }
    } else {
        dotenv::dotenv().ok();
    }
}

#[derive(Parser)]
#[command(name = "soundalike")]
#[command(about = "Soundalike - recommend similar tracks from a local music library", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract embeddings for the music library and write store + index
    Build {
        /// Directory containing audio files
        #[arg(long)]
        music_dir: Option<PathBuf>,

        /// Parallel extraction workers
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print recommendations for one track
    Recommend {
        /// Track identifier (file name)
        song: String,

        /// Number of recommendations
        #[arg(long)]
        top_n: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    load_dotenv_from_project_root();

    let mut config = AppConfig::from_env()?;

    match cli.command {
        Some(Commands::Build { music_dir, workers }) => {
            if let Some(dir) = music_dir {
                config.music_dir = dir;
            }
            if let Some(workers) = workers {
                config.extract_workers = workers;
            }
            config.validate()?;
            logger::setup_logging(&config.log_dir, &config.log_level)?;

            build(&config).await?;
        }
        Some(Commands::Recommend { song, top_n }) => {
            config.validate()?;
            logger::setup_console_logging(&config.log_level)?;

            let catalog = Catalog::load(&config.store_path, &config.index_path)
                .context("Failed to load catalog")?;
            let results = catalog.recommend(&song, top_n.unwrap_or(config.default_top_n))?;

            for (rank, r) in results.iter().enumerate() {
                println!("{:>3}. {}  ({:.4})", rank + 1, r.track, r.distance);
            }
        }
        Some(Commands::Serve { host, port }) => {
            if let Some(host) = host {
                config.server_host = host;
            }
            if let Some(port) = port {
                config.server_port = port;
            }
            serve(config).await?;
        }
        None => serve(config).await?,
    }

    Ok(())
}

async fn serve(config: AppConfig) -> Result<()> {
    config.validate()?;
    logger::setup_logging(&config.log_dir, &config.log_level)?;

    tracing::info!("Soundalike starting...");
    tracing::info!("  Bind: {}", config.server_bind_address());
    tracing::info!("  Store: {}", config.store_path.display());
    tracing::info!("  Index: {}", config.index_path.display());

    println!("Server listening on http://{}", config.server_bind_address());
    soundalike_server::start_server(config).await?;
    Ok(())
}

async fn build(config: &AppConfig) -> Result<()> {
    tracing::info!("Building catalog from {}", config.music_dir.display());

    let assets = scan_library(&config.music_dir)?;
    let extractor = Arc::new(MfccExtractor::new(config.extract_duration_secs));

    let progress = ProgressBar::new(assets.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {wide_msg}")
            .context("Invalid progress template")?,
    );

    let mut skipped = 0usize;
    let catalog = build_catalog(&assets, extractor, config.extract_workers, |path, indexed| {
        if !indexed {
            skipped += 1;
        }
        progress.set_message(soundalike_vector::track_identifier(path));
        progress.inc(1);
    })
    .await?;
    progress.finish_and_clear();

    catalog.save(&config.store_path, &config.index_path)?;

    println!(
        "Saved embeddings for {} songs ({} skipped) to {}",
        catalog.len(),
        skipped,
        config.store_path.display()
    );
    Ok(())
}
