use clap::Parser;
use image_curator::config::CuratorConfig;
use image_curator::store::ImageStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "image-curator")]
#[command(about = "Image curation web app: normalized uploads, gallery layouts, PDF export")]
#[command(version)]
struct Cli {
    /// Optional TOML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind, e.g. 127.0.0.1:5000
    #[arg(long)]
    bind: Option<String>,

    /// Directory for stored artifacts
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// SQLite database file
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = CuratorConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(dir) = cli.upload_dir {
        config.upload_dir = dir;
    }
    if let Some(db) = cli.db_path {
        config.db_path = db;
    }

    let store = ImageStore::open(&config.db_path)?;
    tracing::info!(
        db = %config.db_path.display(),
        uploads = %config.upload_dir.display(),
        "starting image-curator"
    );

    image_curator::server::serve(config, store).await
}
