//! Report Builder CLI - Command line tool for assembling PDF reports.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use report_builder_core::pdf::SourcePdf;
use report_builder_core::{
    BuildConfig, ReportBuilder, ReportNode, check_paths, filter_by_method_codes, validate_report,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "report-build")]
#[command(author, version, about = "Assemble bookmarked PDF reports", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a report into one PDF
    Build {
        /// Report definition (JSON)
        report: PathBuf,

        /// Output PDF file (default: <report stem>.pdf next to the report)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory report paths are relative to (default: the report's directory)
        #[arg(long, env = "REPORT_ROOT")]
        root: Option<PathBuf>,

        /// Keep only sections for these method codes (comma separated)
        #[arg(long, value_delimiter = ',')]
        method_codes: Vec<String>,

        /// Renderer timeout in seconds
        #[arg(long, env = "REPORT_RENDER_TIMEOUT")]
        timeout: Option<u64>,

        /// Write build diagnostics as JSON to this file
        #[arg(long)]
        diagnostics_json: Option<PathBuf>,

        /// Do not write the editable table of contents
        #[arg(long)]
        no_toc_document: bool,
    },

    /// Check a report definition and the files it refers to
    Validate {
        /// Report definition (JSON)
        report: PathBuf,

        /// Directory report paths are relative to (default: the report's directory)
        #[arg(long, env = "REPORT_ROOT")]
        root: Option<PathBuf>,
    },

    /// Print the outline embedded in a PDF
    Outline {
        /// PDF file
        pdf: PathBuf,
    },
}

fn load_report(path: &Path) -> Result<ReportNode> {
    ReportNode::from_file(path).context(format!("Failed to load report: {}", path.display()))
}

fn root_for(report: &Path, root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| {
        report
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    })
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn build(
    config: BuildConfig,
    report_path: &Path,
    output: Option<PathBuf>,
    root: Option<PathBuf>,
    method_codes: Vec<String>,
    diagnostics_json: Option<PathBuf>,
) -> Result<()> {
    let mut report = load_report(report_path)?;
    if !method_codes.is_empty() {
        let available: BTreeSet<String> = method_codes.into_iter().collect();
        report = filter_by_method_codes(&report, &available)
            .context("No section of the report applies to the given method codes")?;
    }

    let root = root_for(report_path, root);
    let output = output.unwrap_or_else(|| report_path.with_extension("pdf"));
    info!("Building {} into {}", report_path.display(), output.display());

    let pb = spinner();
    let stage_pb = pb.clone();
    let builder = ReportBuilder::with_text_renderer(config)
        .with_progress(move |stage| stage_pb.set_message(stage.as_str()));

    let outcome = builder
        .build(&report, &root, &output)
        .await
        .context(format!("Failed to build report: {}", report_path.display()))?;
    pb.finish_with_message("Build complete");

    if let Some(path) = diagnostics_json {
        let json = serde_json::to_string_pretty(&outcome.diagnostics)
            .context("Failed to serialize diagnostics")?;
        std::fs::write(&path, json)
            .context(format!("Failed to write diagnostics: {}", path.display()))?;
    }

    for missing in &outcome.diagnostics.missing {
        warn!(
            "Skipped '{}': missing {} {}",
            missing.node_id,
            missing.kind.as_str(),
            missing.path.display()
        );
    }

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!(
            "Report saved to: {} ({} pages, {} bookmarks)",
            outcome.output.display(),
            outcome.page_count,
            outcome.bookmarks.len()
        );
        if let Some(toc) = &outcome.toc_document {
            println!("Table of contents saved to: {}", toc.display());
        }
        for failure in &outcome.diagnostics.render_failures {
            println!("Placeholder for '{}': {}", failure.node_id, failure.message);
        }
        for problem in &outcome.diagnostics.problem_files {
            println!(
                "Problem file: {} ({} unreadable bookmarks)",
                problem.path.display(),
                problem.unparseable_bookmarks
            );
        }
    }

    Ok(())
}

fn validate(report_path: &Path, root: Option<PathBuf>) -> Result<()> {
    let report = load_report(report_path)?;
    validate_report(&report).context("Report definition is invalid")?;

    let root = root_for(report_path, root);
    let missing = check_paths(&report, &root);

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        for resource in &missing {
            println!(
                "missing {} for '{}': {}",
                resource.kind.as_str(),
                resource.node_id,
                resource.path.display()
            );
        }
        println!(
            "{}: definition is valid, {} missing path(s)",
            report_path.display(),
            missing.len()
        );
    }
    Ok(())
}

fn outline(path: &Path) -> Result<()> {
    let pdf = SourcePdf::from_file(path).context(format!("Failed to load PDF: {}", path.display()))?;
    let outline = pdf.outline();
    if outline.malformed > 0 {
        warn!("{} unreadable outline entries skipped", outline.malformed);
    }

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    for entry in &outline.entries {
        println!(
            "{}{}  ...  {}",
            "  ".repeat(entry.level),
            entry.title,
            entry.page.as_page_number()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Load or create config
    let mut config = if let Some(config_path) = &args.config {
        BuildConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        BuildConfig::load()
    };

    match args.command {
        Command::Build {
            report,
            output,
            root,
            method_codes,
            timeout,
            diagnostics_json,
            no_toc_document,
        } => {
            // Override config with CLI arguments
            if let Some(timeout) = timeout {
                config.renderer.timeout_secs = timeout;
            }
            if no_toc_document {
                config.write_toc_document = false;
            }
            build(config, &report, output, root, method_codes, diagnostics_json).await
        }
        Command::Validate { report, root } => validate(&report, root),
        Command::Outline { pdf } => outline(&pdf),
    }
}
