use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{debug, error, info};

use spacenet_prep::dataset::rename_rio;
use spacenet_prep::{default_reader, pipeline, ParseMode, PipelineConfig, PrepError, Split};

/// CLI subcommands
#[derive(Subcommand, Debug)]
enum Command {
    /// Build per-city region indexes for train and val, then merge each split
    Annotate {
        /// Abort a city on the first malformed WKT polygon instead of skipping it
        #[arg(long)]
        strict: bool,
    },

    /// Merge already written per-city indexes of one split
    Merge {
        #[arg(long, value_enum)]
        split: Split,
    },

    /// Convert rasters to PNG for train, val and test
    Convert,

    /// Move raw Rio rasters (3band_AOI_1_RIO_img*.tif) into RGB-PanSharpen/ under canonical names
    RenameRio {
        /// The AOI_1_Rio_Train directory
        #[arg(long)]
        dir: PathBuf,
    },

    /// Print the effective configuration as JSON
    ShowConfig,
}

/// Global options
#[derive(Parser, Debug)]
#[command(author, version, about = "SpaceNet building-footprint dataset preparation", long_about = None)]
struct Cli {
    /// JSON layout file; the built-in five-city layout under --root is used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dataset root for the built-in layout (also the output root)
    #[arg(long, default_value = "Spacenet")]
    root: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

fn load_config(cli: &Cli) -> Result<PipelineConfig, PrepError> {
    match &cli.config {
        Some(path) => PipelineConfig::load(path),
        None => {
            let config = PipelineConfig::spacenet(&cli.root);
            config.validate()?;
            Ok(config)
        }
    }
}

fn run(cli: Cli) -> Result<(), PrepError> {
    let mut config = load_config(&cli)?;
    debug!("Configuration: {:?}", config);

    match cli.command {
        Command::Annotate { strict } => {
            if strict {
                config.parse_mode = ParseMode::Strict;
            }
            let reader = default_reader();
            for path in pipeline::annotate(&config, reader.as_ref())? {
                info!("Wrote {}", path.display());
            }
        }
        Command::Merge { split } => {
            let path = pipeline::merge(&config, split)?;
            info!("Wrote {}", path.display());
        }
        Command::Convert => {
            let reader = default_reader();
            let count = pipeline::convert(&config, reader.as_ref())?;
            info!("Converted {} rasters", count);
        }
        Command::RenameRio { dir } => {
            rename_rio(&dir)?;
        }
        Command::ShowConfig => {
            let json = serde_json::to_string_pretty(&config).map_err(|source| PrepError::Json {
                path: cli.config.clone().unwrap_or_else(|| cli.root.clone()),
                source,
            })?;
            println!("{json}");
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let default_level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    info!("========== SpaceNet prep starting ==========");
    debug!("Parsed CLI args: {:?}", cli);

    if let Err(e) = run(cli) {
        error!("{e}");
        std::process::exit(1);
    }
    info!("========== SpaceNet prep complete ==========");
}
