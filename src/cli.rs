use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::catalog::RetrievalMode;

#[derive(Parser)]
#[command(name = "vegscan")]
#[command(version, about = "Satellite vegetation index analysis")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Analysis config (JSON); built-in defaults when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding stored analyses
    #[arg(long, default_value = "vegscan-data", global = true)]
    pub store: PathBuf,

    /// Owner the records belong to
    #[arg(long, default_value = "default", global = true)]
    pub owner: String,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// A point with radius, or a polygon ring as JSON.
#[derive(Args, Debug, Clone)]
pub struct AreaArgs {
    /// Longitude of the centre point
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lon: Option<f64>,

    /// Latitude of the centre point
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    pub lat: Option<f64>,

    /// Radius around the point, in kilometres
    #[arg(long, default_value = "1.0")]
    pub radius_km: f64,

    /// Polygon ring as JSON, e.g. '[[12.1,41.9],[12.2,41.9],[12.2,42.0]]'
    #[arg(long)]
    pub polygon: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an analysis and store it
    Analyze {
        #[command(flatten)]
        area: AreaArgs,

        /// First acquisition date (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// Last acquisition date (YYYY-MM-DD)
        #[arg(long)]
        end: String,

        /// Scene selection: single_best or collection
        #[arg(long, value_enum, default_value = "collection")]
        mode: ModeArg,
    },

    /// List the owner's recent analyses
    List,

    /// Print a stored analysis
    Show {
        analysis_id: String,

        /// Write the image artifacts into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },

    /// Delete a stored analysis
    Delete { analysis_id: String },

    /// Monthly mean NDVI
    History {
        #[command(flatten)]
        area: AreaArgs,

        /// First month's date (YYYY-MM-DD); defaults to 24 months before the end
        #[arg(long)]
        start: Option<String>,

        /// Last date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        end: Option<String>,
    },

    /// Saved areas of interest
    Fields {
        #[command(subcommand)]
        action: FieldCommands,
    },

    /// Run the analyses listed in a batch file
    Batch {
        /// Batch file (JSON)
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum FieldCommands {
    /// Save an area under a name
    Save {
        name: String,

        #[command(flatten)]
        area: AreaArgs,
    },
    /// List saved areas
    List,
    /// Delete a saved area
    Delete { field_id: String },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
#[value(rename_all = "snake_case")]
pub enum ModeArg {
    SingleBest,
    Collection,
}

impl From<ModeArg> for RetrievalMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::SingleBest => RetrievalMode::SingleBest,
            ModeArg::Collection => RetrievalMode::Collection,
        }
    }
}
