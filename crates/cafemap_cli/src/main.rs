//! CLI entry point for the cafe map core.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `cafemap_core` linkage.
//! - List, export and scan against the persisted store from a terminal.

use anyhow::{bail, Context, Result};
use cafemap_core::marker::{MapClickListener, MapListenerId, MapSurface};
use cafemap_core::{
    AppConfig, CafeMapSession, CafeRecord, GooglePlacesClient, LatLng, LatLngBounds,
    MarkerAction, ScanOutcome, SearchArea, SqliteCafeStore,
};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cafemap", about = "Cafe map core toolbox")]
struct Cli {
    /// SQLite file (defaults to $CAFEMAP_DB_PATH or the temp dir)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,
    /// Absolute directory for rolling logs; logging stays off when absent
    #[arg(long, global = true)]
    log_dir: Option<String>,
    #[arg(long, global = true, default_value = cafemap_core::default_log_level())]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print core linkage info
    Ping,
    /// List persisted cafes
    List {
        /// Annotate with distance from this latitude
        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,
    },
    /// Write persisted cafes to mapeo_cafes_<count>_items.json
    Export {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Scan a rectangle with the place-search provider
    Scan {
        #[arg(long, allow_hyphen_values = true)]
        south: f64,
        #[arg(long, allow_hyphen_values = true)]
        west: f64,
        #[arg(long, allow_hyphen_values = true)]
        north: f64,
        #[arg(long, allow_hyphen_values = true)]
        east: f64,
        #[arg(long, env = "CAFEMAP_PLACES_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
}

/// Terminal sessions render no markers.
struct HeadlessSurface;

impl MapSurface for HeadlessSurface {
    fn add_click_listener(&self, _listener: MapClickListener) -> MapListenerId {
        0
    }

    fn remove_click_listener(&self, _id: MapListenerId) {}
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        cafemap_core::init_logging(&cli.log_level, log_dir)
            .map_err(anyhow::Error::msg)
            .context("logging init failed")?;
    }

    if let Command::Ping = cli.command {
        println!("cafemap_core ping={}", cafemap_core::ping());
        println!("cafemap_core version={}", cafemap_core::core_version());
        return Ok(());
    }

    let mut config = AppConfig::from_env();
    if let Some(path) = cli.db_path {
        config.db_path = Some(path);
    }
    if let Command::Scan {
        api_key: Some(key), ..
    } = &cli.command
    {
        config.places_api_key = Some(key.clone());
    }

    let db_path = config.resolved_db_path();
    let store = SqliteCafeStore::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    let catalog = Arc::new(GooglePlacesClient::from_config(&config));
    let session = CafeMapSession::new(
        config,
        catalog,
        Arc::new(store),
        Arc::new(HeadlessSurface),
        MarkerAction::system_browser(),
    );
    session.load().await?;

    match cli.command {
        Command::Ping => {}
        Command::List { lat, lng } => {
            let records = match lat.zip(lng) {
                Some((lat, lng)) => session.cafes_from(LatLng::new(lat, lng)),
                None => session.cafes(),
            };
            for record in &records {
                println!("{}", format_record(record));
            }
            info!(
                "event=cli_list module=cli status=ok count={} with_origin={}",
                records.len(),
                lat.is_some()
            );
            println!("{} cafe(s)", records.len());
        }
        Command::Export { out_dir } => {
            let export = session.export_json()?;
            let path = out_dir.join(&export.file_name);
            std::fs::write(&path, export.contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(
                "event=cli_export module=cli status=ok file={}",
                export.file_name
            );
            println!("wrote {}", path.display());
        }
        Command::Scan {
            south,
            west,
            north,
            east,
            ..
        } => {
            let area = SearchArea::Viewport(LatLngBounds::new(
                LatLng::new(south, west),
                LatLng::new(north, east),
            ));
            let outcome = session.scan(area).await?;
            info!(
                "event=cli_scan module=cli status=done outcome={}",
                outcome_label(&outcome)
            );
            match outcome {
                ScanOutcome::Added(records) => {
                    for record in &records {
                        println!("+ {}", format_record(record));
                    }
                    println!("added {} cafe(s)", records.len());
                }
                ScanOutcome::NoNewItems => println!("no new cafes in this area"),
                ScanOutcome::QueryFailed => {
                    warn!("event=cli_scan module=cli status=error stage=query");
                    bail!("search failed; check the API key and network")
                }
                ScanOutcome::PersistFailed => {
                    warn!("event=cli_scan module=cli status=error stage=persist");
                    bail!("could not save new cafes")
                }
            }
        }
    }

    session.shutdown();
    Ok(())
}

fn outcome_label(outcome: &ScanOutcome) -> &'static str {
    match outcome {
        ScanOutcome::Added(_) => "added",
        ScanOutcome::NoNewItems => "no_new_items",
        ScanOutcome::QueryFailed => "query_failed",
        ScanOutcome::PersistFailed => "persist_failed",
    }
}

fn format_record(record: &CafeRecord) -> String {
    let rating = record
        .rating
        .map(|rating| format!("{rating:.1}"))
        .unwrap_or_else(|| "-".to_string());
    let distance = record
        .distance_km
        .map(|km| format!(" {km:.2}km"))
        .unwrap_or_default();
    format!(
        "{}\t{}\t{:.5},{:.5}\trating={}{}",
        record.id, record.name, record.position.lat, record.position.lng, rating, distance
    )
}
