//! Builds the per-movie feature table from the relational CSV dump and runs the
//! stepwise regressions on it.
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

mod aggregate;
mod config;
mod director;
mod encoder;
mod error;
mod io;
mod model;
mod plot;
mod process;
mod runner;
mod selection;
mod stats;
mod table;
mod vif;

use aggregate::{build_feature_table, Encoders, FeatureParams};
use config::{RegressionConfig, RunParams};
use encoder::{CategoryEncoder, Taxonomy};
use io::MovieCorpus;
use table::FeatureTable;
use vif::VifFit;

#[derive(Parser, Debug)]
#[command(about = "Movie feature aggregation and stepwise OLS regression")]
struct Cli {
    /// Directory holding movies.csv and the relation tables.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// TOML processing recipe; the built-in recipe is used when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON taxonomy overriding the bundled country -> continent map.
    #[arg(long)]
    continents: Option<PathBuf>,

    /// JSON taxonomy overriding the bundled genre map.
    #[arg(long)]
    genres: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the raw feature table as CSV.
    Features {
        #[arg(long)]
        out: PathBuf,
    },
    /// One regression over the given decades (all when none given).
    Regress {
        #[arg(long = "decade")]
        decades: Vec<i32>,
        /// Save a coefficient chart to this PNG.
        #[arg(long)]
        plot: Option<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// One regression per decade, reporting R² for each.
    Decades {
        #[arg(long = "decade", required = true)]
        decades: Vec<i32>,
        /// Save an R²-by-decade chart to this PNG.
        #[arg(long)]
        plot: Option<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Rating from which a movie counts as a success.
    #[arg(long, default_value_t = 7.5)]
    threshold: f64,
    #[arg(long, default_value_t = 0.05)]
    alpha: f64,
    #[arg(long, default_value_t = 5.0)]
    vif_threshold: f64,
    /// Compute VIFs with an intercept (centered R²) instead of through the origin.
    #[arg(long)]
    centered_vif: bool,
    /// Flip the binary target (1 = below the threshold).
    #[arg(long)]
    bad_movies: bool,
    /// Regress on the binary target instead of the raw rating.
    #[arg(long)]
    binary: bool,
}

impl From<&RunArgs> for RunParams {
    fn from(args: &RunArgs) -> Self {
        Self {
            success_threshold: args.threshold,
            alpha: args.alpha,
            vif_threshold: args.vif_threshold,
            vif_fit: if args.centered_vif {
                VifFit::Centered
            } else {
                VifFit::Uncentered
            },
            invert: args.bad_movies,
            binary_target: args.binary,
        }
    }
}

fn load_encoder(kind: &'static str, path: Option<&Path>) -> anyhow::Result<CategoryEncoder> {
    let encoder = match path {
        Some(path) => {
            let taxonomy = Taxonomy::load(path)
                .with_context(|| format!("loading {kind} taxonomy {}", path.display()))?;
            CategoryEncoder::new(kind, taxonomy)?
        }
        None if kind == "country" => CategoryEncoder::continents()?,
        None => CategoryEncoder::genres()?,
    };
    Ok(encoder)
}

fn feature_table(cli: &Cli) -> anyhow::Result<FeatureTable> {
    let encoders = Encoders {
        continents: load_encoder("country", cli.continents.as_deref())?,
        genres: load_encoder("genre", cli.genres.as_deref())?,
    };
    let corpus = MovieCorpus::load(&cli.data_dir)
        .with_context(|| format!("loading corpus from {}", cli.data_dir.display()))?;
    let table = build_feature_table(&corpus, &encoders, &FeatureParams::default())
        .context("building the feature table")?;
    Ok(table)
}

fn recipe(cli: &Cli) -> anyhow::Result<RegressionConfig> {
    match &cli.config {
        Some(path) => RegressionConfig::load(path)
            .with_context(|| format!("loading recipe {}", path.display())),
        None => Ok(RegressionConfig::default()),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = recipe(&cli)?;
    let table = feature_table(&cli)?;

    match &cli.command {
        Command::Features { out } => {
            let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
            table
                .write_csv(file)
                .with_context(|| format!("writing {}", out.display()))?;
            info!(rows = table.n_rows(), "wrote feature table to {}", out.display());
        }
        Command::Regress {
            decades,
            plot: chart,
            run: args,
        } => {
            let report = runner::simple_regression(&table, decades, &config, &args.into())?;
            println!("{report}");
            if let Some(path) = chart {
                plot::coefficients(&report, path)?;
                println!("Wrote {}", path.display());
            }
        }
        Command::Decades {
            decades,
            plot: chart,
            run: args,
        } => {
            let scores = runner::decade_pipeline(&table, decades, &config, &args.into())?;
            println!("{:<8} {:>10} {:>8}  features", "decade", "R-squared", "n");
            for s in &scores {
                println!(
                    "{:<8} {:>10.4} {:>8}  {}",
                    s.decade,
                    s.r_squared,
                    s.n_obs,
                    s.features.join(", ")
                );
            }
            if let Some(path) = chart {
                plot::r_squared_by_decade(&scores, path)?;
                println!("Wrote {}", path.display());
            }
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    run(Cli::parse())
}
