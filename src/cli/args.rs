use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aqi-processor")]
#[command(about = "Satellite air quality processor: AQI transform, quality filtering and spatial queries")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Settings file [default: aqi-processor.toml if present]"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert, annotate and quality-check every new or changed measurement file
    Process {
        #[arg(short, long, help = "Directory of extracted measurement JSON files")]
        input_dir: PathBuf,

        #[arg(short, long, help = "Directory for SURFACE_*.json outputs")]
        output_dir: Option<PathBuf>,

        #[arg(long, help = "Processing cache directory [default: <output_dir>/.cache]")]
        cache_dir: Option<PathBuf>,

        #[arg(short, long, help = "Force pollutant kind (NO2, O3, AEROSOL)")]
        pollutant: Option<String>,

        #[arg(short, long, help = "Quality strategy: strict, moderate, permissive, fallback")]
        strategy: Option<String>,

        #[arg(long)]
        max_workers: Option<usize>,

        #[arg(long, help = "Reprocess files even if unchanged")]
        force: bool,

        #[arg(long, help = "Pretty-print output JSON")]
        pretty: bool,
    },

    /// Query a processed file by bounding box and quality
    Query {
        #[arg(short, long, help = "Processed SURFACE_*.json file")]
        file: PathBuf,

        #[arg(
            long,
            num_args = 4,
            allow_negative_numbers = true,
            value_names = ["LAT_MIN", "LAT_MAX", "LON_MIN", "LON_MAX"],
            help = "Bounding box in degrees"
        )]
        bbox: Option<Vec<f64>>,

        #[arg(short, long)]
        strategy: Option<String>,

        #[arg(long)]
        page_size: Option<usize>,

        #[arg(long, help = "Print the response envelope as JSON")]
        json: bool,
    },

    /// Audit the quality of every processed file in a directory
    Validate {
        #[arg(short, long, help = "Directory of SURFACE_*.json files")]
        input_dir: Option<PathBuf>,

        #[arg(short, long)]
        strategy: Option<String>,
    },

    /// Display statistics for a processed file
    Stats {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete dated output files older than the retention window
    Clean {
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[arg(long)]
        days_to_keep: Option<u32>,

        #[arg(long, help = "Report what would be deleted without deleting")]
        dry_run: bool,
    },
}
