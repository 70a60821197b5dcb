//! Ingest a multi-source request file into PostgreSQL.
//!
//! Usage: `canon-ingest [--skip-migrations] <request.json>`

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use canon_core::UnitOfWork;
use canon_db::{Database, DatabaseConfig};
use canon_ingest::{ingest_multi_source, load_request, IngestConfig, IngestionPipeline};

#[derive(Parser)]
#[command(name = "canon-ingest")]
#[command(version, about = "Merge a multi-source request into one canonical record")]
struct Cli {
    /// JSON request file with `series_slug`, `raw_sources` and optional `requested_by`
    request: PathBuf,

    /// Do not apply pending schema migrations before ingesting
    #[arg(long)]
    skip_migrations: bool,
}

fn init_tracing() {
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "canon_ingest=info,canon_db=info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "canon_ingest=info,canon_db=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let mut layer = tracing_subscriber::fmt::layer();
        if let Some(ansi) = log_ansi {
            layer = layer.with_ansi(ansi);
        }
        registry.with(layer).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing();

    let request = load_request(&cli.request)
        .with_context(|| format!("failed to load request from {}", cli.request.display()))?;

    let db_config = DatabaseConfig::from_env()?;
    let db = Database::connect(&db_config).await?;
    if !cli.skip_migrations {
        db.migrate().await?;
    }

    let pipeline = IngestionPipeline::reference(&IngestConfig::from_env())?;

    let mut uow = db.unit_of_work();
    let Some(profile) = uow
        .series_profiles()
        .get_by_slug(&request.series_slug, None)
        .await?
    else {
        uow.rollback().await?;
        bail!("series profile '{}' not found", request.series_slug);
    };

    let record = ingest_multi_source(&mut uow, &profile, request, &pipeline).await?;

    info!(
        subsystem = "ingest",
        component = "cli",
        record_id = %record.id,
        "Canonical record created"
    );
    println!("{}\t{}", record.id, record.title);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_request_path_is_required() {
        assert!(Cli::try_parse_from(["canon-ingest"]).is_err());

        let cli = Cli::try_parse_from(["canon-ingest", "req.json"]).unwrap();
        assert_eq!(cli.request, PathBuf::from("req.json"));
        assert!(!cli.skip_migrations);

        let cli = Cli::try_parse_from(["canon-ingest", "--skip-migrations", "req.json"]).unwrap();
        assert!(cli.skip_migrations);
    }
}
