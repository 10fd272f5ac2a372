//! immunoprofile - immune cell count analysis CLI
//!
//! Loads per-sample cell counts into SQLite, derives relative frequencies and
//! compares responders with non-responders.

use clap::{Parser, Subcommand};
use immunoprofile::error::Result;
use immunoprofile::pipeline::{analyze, load, Pipeline, PipelineConfig};
use immunoprofile::store::DerivedStore;
use immunoprofile::summary::CohortFilter;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Immune cell population profiling
#[derive(Parser)]
#[command(name = "immunoprofile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the database from a CSV file and derive relative frequencies
    Load {
        /// Path to the cell count CSV
        #[arg(short, long, default_value = "cell-count.csv")]
        input: PathBuf,

        /// Path to the SQLite database (recreated)
        #[arg(short, long, default_value = "cell_counts.db")]
        database: PathBuf,

        /// Number of frequency rows to preview
        #[arg(long, default_value = "20")]
        preview: usize,

        /// Also write the full frequency table as TSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize the baseline cohort and compare responders in a loaded database
    Analyze {
        /// Path to the SQLite database
        #[arg(short, long, default_value = "cell_counts.db")]
        database: PathBuf,

        /// Directory for TSV/JSON outputs
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Treatment of the comparison cohort
        #[arg(long, default_value = "miraclib")]
        treatment: String,

        /// Sample type of the comparison cohort
        #[arg(long, default_value = "PBMC")]
        sample_type: String,

        /// Significance level
        #[arg(long, default_value = "0.05")]
        alpha: f64,

        /// Minimum samples per response group
        #[arg(long, default_value = "3")]
        min_group_size: usize,
    },

    /// Run the full pipeline from a YAML configuration file
    Run {
        /// Path to pipeline configuration YAML
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Write the default pipeline configuration
    Example {
        /// Output path for the YAML configuration
        #[arg(short, long, default_value = "pipeline.yaml")]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Load {
            input,
            database,
            preview,
            output,
        } => cmd_load(&input, &database, preview, output.as_deref()),

        Commands::Analyze {
            database,
            output_dir,
            treatment,
            sample_type,
            alpha,
            min_group_size,
        } => cmd_analyze(
            &database,
            output_dir,
            &treatment,
            &sample_type,
            alpha,
            min_group_size,
        ),

        Commands::Run { config } => cmd_run(&config),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Ingest a CSV and derive frequencies
fn cmd_load(input: &Path, database: &Path, preview: usize, output: Option<&Path>) -> Result<()> {
    eprintln!("Loading {:?} into {:?}...", input, database);
    let (summary, store) = load(input, database)?;
    eprint!("{}", summary);

    let frequencies = store.frequencies()?;
    eprintln!(
        "Derived {} frequency rows ({} undefined)",
        frequencies.len(),
        frequencies.n_undefined()
    );

    if let Some(path) = output {
        eprintln!("Writing frequencies to {:?}...", path);
        frequencies.to_tsv(path)?;
    }

    println!();
    println!("Relative frequencies (first {} rows)", preview);
    print!("{}", frequencies.format_preview(preview));

    Ok(())
}

/// Analyze an already loaded database
fn cmd_analyze(
    database: &Path,
    output_dir: Option<PathBuf>,
    treatment: &str,
    sample_type: &str,
    alpha: f64,
    min_group_size: usize,
) -> Result<()> {
    let mut config = PipelineConfig {
        output_dir,
        response_cohort: CohortFilter::all()
            .treatment(treatment)
            .sample_type(sample_type),
        ..Default::default()
    };
    config.compare.alpha = alpha;
    config.compare.min_group_size = min_group_size;

    eprintln!("Opening {:?}...", database);
    let store = DerivedStore::open_existing(database)?;
    let report = analyze(&store, &config)?;

    if let Some(dir) = &config.output_dir {
        eprintln!("Writing results to {:?}...", dir);
        report.write_outputs(dir)?;
    }

    println!("{}", report);

    Ok(())
}

/// Run a pipeline from configuration
fn cmd_run(config_path: &Path) -> Result<()> {
    eprintln!("Loading pipeline configuration from {:?}...", config_path);
    let config = PipelineConfig::from_file(config_path)?;
    let preview = config.preview_limit;

    eprintln!("Running pipeline '{}'...", config.name);
    let report = Pipeline::from_config(config).run()?;

    eprint!("{}", report.ingest);
    println!();
    print!("{}", report.frequencies.format_preview(preview));
    println!();
    println!("{}", report.analysis);

    eprintln!(
        "Done! {} populations tested, {} significant",
        report.analysis.comparison.len(),
        report.analysis.comparison.significant().len()
    );

    Ok(())
}

/// Write an example configuration
fn cmd_example(output_path: &Path) -> Result<()> {
    let config = PipelineConfig {
        description: Some(
            "Load cell counts, derive frequencies and compare miraclib responders".to_string(),
        ),
        ..Default::default()
    };
    let yaml = config.to_yaml()?;

    std::fs::write(output_path, &yaml)?;
    eprintln!("Wrote example pipeline to {:?}", output_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);

    Ok(())
}
