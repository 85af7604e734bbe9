use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facetally_core::batch::{self, BatchEvent};
use facetally_core::report::{self, AgeHistogram, LabelStats, SummaryStatistics};
use facetally_core::{export, AnalysisRecord, AnalysisSession, Categories, SessionStats};
use facetally_vision::OnnxClassifier;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::Config;

#[derive(Parser)]
#[command(
    name = "facetally",
    about = "Facial demographic analysis — batch CSV and session reports"
)]
struct Cli {
    /// TOML config file (overrides FACETALLY_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every image in a folder and write one CSV row per image
    Batch {
        /// Folder containing the images
        #[arg(short, long, default_value = "faceimages")]
        input: PathBuf,
        /// CSV file to write
        #[arg(short, long, default_value = "face_analysis_results.csv")]
        output: PathBuf,
    },
    /// Analyze images and report per-image results, distributions and statistics
    Analyze {
        /// Images to analyze, in order
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Write the results table as CSV
        #[arg(long)]
        export: Option<PathBuf>,
        /// Print a JSON report instead of text
        #[arg(long)]
        json: bool,
        /// Number of age histogram bins
        #[arg(long)]
        bins: Option<usize>,
    },
    /// Show resolved configuration and model availability
    Check,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    session: String,
    stats: SessionStats,
    summary: SummaryStatistics,
    age_distribution: AgeHistogram,
    gender_distribution: BTreeMap<String, LabelStats>,
    race_distribution: BTreeMap<String, LabelStats>,
    records: &'a [AnalysisRecord],
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration resolved");

    match cli.command {
        Commands::Batch { input, output } => run_batch(&config, &input, &output),
        Commands::Analyze {
            images,
            export,
            json,
            bins,
        } => run_analyze(&config, &images, export.as_deref(), json, bins),
        Commands::Check => run_check(&config),
    }
}

fn load_classifier(config: &Config) -> Result<OnnxClassifier> {
    OnnxClassifier::load(&config.vision, Categories::default()).with_context(|| {
        format!(
            "failed to load models from {} (run `facetally check`)",
            config.vision.model_dir.display()
        )
    })
}

fn run_batch(config: &Config, input: &Path, output: &Path) -> Result<()> {
    println!("facetally batch");
    println!("===============");

    // Surface a missing folder before paying for model loading.
    let images = batch::list_images(input)?;
    if images.is_empty() {
        println!("No image files found in '{}'.", input.display());
        return Ok(());
    }

    let mut session = AnalysisSession::new(load_classifier(config)?, Categories::default());
    let report = batch::run_batch(&mut session, input, output, |event| match event {
        BatchEvent::Started { total } => println!("Found {total} image(s) to process..."),
        BatchEvent::Processing {
            index,
            total,
            source_id,
        } => println!("Processing {index}/{total}: {source_id}"),
        BatchEvent::Finished { record } => match record.demographics() {
            Some(d) => println!(
                "  ✓ Gender: {}, Race: {}, Age: {}",
                d.gender().label(),
                d.race().label(),
                d.age()
            ),
            None => println!(
                "  ✗ Error processing image {}: {}",
                record.source_id(),
                record.failure().map(|(_, r)| r).unwrap_or_default()
            ),
        },
    })?;

    if let Some(path) = &report.output {
        println!(
            "\nCSV file '{}' created successfully with {} entries.",
            path.display(),
            report.records.len()
        );
    }
    println!("\nSummary:");
    println!("Total images processed: {}", report.stats.total_processed);
    println!("Successful analyses: {}", report.stats.success_count);
    println!("Errors: {}", report.stats.failure_count());
    Ok(())
}

fn run_analyze(
    config: &Config,
    images: &[PathBuf],
    export_path: Option<&Path>,
    json: bool,
    bins: Option<usize>,
) -> Result<()> {
    let bins = bins.unwrap_or(config.histogram_bins);

    let classifier = load_classifier(config)?;
    // Opened after the models load, but before classification.
    let export_file = export_path
        .map(|p| File::create(p).with_context(|| format!("cannot create {}", p.display())))
        .transpose()?;

    let mut session = AnalysisSession::new(classifier, Categories::default());
    for path in images {
        let record = session.analyze_path(path);
        if !json {
            print!("{}", render::record(record));
        }
    }

    let records = session.records();
    if json {
        let doc = JsonReport {
            session: session.id().to_string(),
            stats: session.stats(),
            summary: report::summary_statistics(records),
            age_distribution: report::age_distribution(records, bins),
            gender_distribution: report::gender_distribution(records),
            race_distribution: report::race_distribution(records),
            records,
        };
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!();
        print!("{}", render::performance(&session.stats()));
        println!();
        print!("{}", render::summary(&report::summary_statistics(records)));
        println!();
        print!("{}", render::age_histogram(&report::age_distribution(records, bins)));
        println!();
        let genders = report::gender_distribution(records);
        print!("{}", render::distribution("Gender distribution", &genders));
        println!();
        let races = report::race_distribution(records);
        print!("{}", render::distribution("Race distribution", &races));
    }

    if let (Some(file), Some(path)) = (export_file, export_path) {
        export::write_flat_table(&report::to_flat_table(records), BufWriter::new(file))
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("Results written to {}", path.display());
    }

    Ok(())
}

fn run_check(config: &Config) -> Result<()> {
    let v = &config.vision;
    println!(
        "config file:         {}",
        config
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".into())
    );
    println!("model dir:           {}", v.model_dir.display());
    println!("face detection:      {}", if v.detect_faces { "on" } else { "off" });
    println!("detection threshold: {}", v.detection_threshold);
    println!("intra threads:       {}", v.intra_threads);
    println!("tensor layout:       {:?}", v.layout);
    println!("histogram bins:      {}", config.histogram_bins);

    let missing = v.missing_models();
    for model in v.required_models() {
        let state = if missing.contains(&model) { "missing" } else { "ok" };
        println!("  [{state:^7}] {}", model.display());
    }

    if !missing.is_empty() {
        anyhow::bail!("{} model file(s) missing", missing.len());
    }
    Ok(())
}
