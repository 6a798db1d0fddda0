// src/main.rs
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use vegscan::analysis::{AnalysisResult, NDVI_OVERLAY_IMAGE};
use vegscan::batch::process_batch;
use vegscan::cli::{AreaArgs, Cli, Commands, FieldCommands};
use vegscan::config::AnalysisConfig;
use vegscan::io::write_artifact;
use vegscan::processing::VegetationIndex;
use vegscan::{AnalysisStore, AreaOfInterest, DateRange, FileStore};

/// Months covered by `history` when no start date is given.
const HISTORY_MONTHS: u32 = 24;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = match &cli.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    let records = FileStore::new(&cli.store)?;
    let store = AnalysisStore::from_config(records, &config)?;
    let owner = cli.owner.as_str();

    match &cli.command {
        Commands::Analyze { area, start, end, mode } => {
            let area = parse_area(area)?;
            let range = DateRange::parse(start, end)?;
            let result = store.perform(owner, &area, &range, (*mode).into())?;
            println!("Stored analysis {}", result.analysis_id);
            for image in &result.results_per_image {
                let ndvi = image
                    .mean(VegetationIndex::Ndvi)
                    .map_or_else(|| "n/a".to_string(), |m| format!("{:.3}", m));
                println!("  {} {} cloud {:.1}% mean NDVI {}", image.date, image.scene_id, image.cloud_percentage, ndvi);
            }
            if !result.metadata.skipped.is_empty() {
                println!("  {} image(s) skipped", result.metadata.skipped.len());
            }
        }
        Commands::List => {
            for summary in store.list_summaries(owner)? {
                println!(
                    "{}  {}  {} image(s)  ndvi {:.3}  vari {:.3}  evi {:.3}",
                    summary.analysis_id,
                    summary.date_range,
                    summary.image_count,
                    summary.statistics_summary.ndvi_mean,
                    summary.statistics_summary.vari_mean,
                    summary.statistics_summary.evi_mean,
                );
            }
        }
        Commands::Show { analysis_id, export_dir } => {
            let result = store.get(owner, analysis_id)?;
            match export_dir {
                Some(dir) => {
                    let written = export_images(&result, dir)?;
                    println!("Wrote {} image(s) to {}", written, dir.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&result)?),
            }
        }
        Commands::Delete { analysis_id } => {
            store.delete(owner, analysis_id)?;
            println!("Deleted analysis {}", analysis_id);
        }
        Commands::History { area, start, end } => {
            let area = parse_area(area)?;
            let end = match end {
                Some(end) => end.clone(),
                None => Local::now().date_naive().to_string(),
            };
            let range = match start {
                Some(start) => DateRange::parse(start, &end)?,
                None => {
                    let end = NaiveDate::parse_from_str(&end, "%Y-%m-%d")
                        .with_context(|| format!("invalid end date '{}'", end))?;
                    DateRange::trailing_months(end, HISTORY_MONTHS)?
                }
            };
            for month in store.ndvi_history(&area, &range)? {
                println!(
                    "{}  {:.3}  {} ({:.1}% cloud)",
                    month.month, month.mean_ndvi, month.scene_id, month.cloud_percentage
                );
            }
        }
        Commands::Fields { action } => match action {
            FieldCommands::Save { name, area } => {
                let field = store.save_field(owner, name, &parse_area(area)?)?;
                println!("Saved field {} ({})", field.id, field.name);
            }
            FieldCommands::List => {
                for field in store.list_fields(owner)? {
                    println!("{}  {}  created {}", field.id, field.name, field.created.to_rfc3339());
                }
            }
            FieldCommands::Delete { field_id } => {
                store.delete_field(owner, field_id)?;
                println!("Deleted field {}", field_id);
            }
        },
        Commands::Batch { file } => {
            let outcomes = process_batch(file, &store)?;
            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
            println!("Batch complete: {} succeeded, {} failed", outcomes.len() - failed, failed);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn parse_area(args: &AreaArgs) -> Result<AreaOfInterest> {
    let polygon = args
        .polygon
        .as_deref()
        .map(|json| serde_json::from_str::<Vec<[f64; 2]>>(json))
        .transpose()
        .context("polygon must be a JSON array of [lon, lat] pairs")?;
    let point = args.lon.zip(args.lat);
    Ok(AreaOfInterest::from_parts(point, args.radius_km, polygon)?)
}

/// Decode every non-empty artifact into `<scene>_<name>.<ext>` under `dir`.
fn export_images(result: &AnalysisResult, dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = 0;
    for image in &result.results_per_image {
        for (name, encoded) in image.images.iter().filter(|(_, e)| !e.is_empty()) {
            let ext = if name == NDVI_OVERLAY_IMAGE { "png" } else { "jpg" };
            let path = dir.join(format!("{}_{}.{}", image.scene_id, name, ext));
            write_artifact(encoded, &path)?;
            info!(path = %path.display(), "artifact written");
            written += 1;
        }
    }
    Ok(written)
}
