use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use chimpdump_adapters::configuration;
use chimpdump_adapters::telemetry;
use chimpdump_adapters::{FileCredentialLoader, FileExportSink, HttpMarketingApi};
use chimpdump_core::config::Settings;
use chimpdump_core::entities::{ExportSummary, ResourceKind};
use chimpdump_core::ports::MarketingApi;
use chimpdump_core::use_cases::{ExportEvent, ExportUseCase};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export resources into the output directory
    Export {
        /// API key file (JSON with an "apiKey" field)
        #[arg(short, long)]
        key_file: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only export this resource (repeatable, see `resources`)
        #[arg(long, value_name = "KIND", value_parser = parse_kind)]
        only: Vec<ResourceKind>,

        /// Print the summary as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Validate the API key and ping the API
    Check {
        /// API key file (JSON with an "apiKey" field)
        #[arg(short, long)]
        key_file: Option<PathBuf>,
    },

    /// List exportable resources and their output folders
    Resources,
}

fn parse_kind(s: &str) -> Result<ResourceKind, String> {
    s.parse::<ResourceKind>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = configuration::get_configuration().context("configuration loading failed")?;

    let _guard = telemetry::init_subscriber("chimpdump", &settings.log_level)?;

    match cli.command {
        Commands::Export {
            key_file,
            output,
            only,
            json,
        } => {
            let mut settings = settings;
            if let Some(path) = key_file {
                settings.api.key_path = path;
            }
            if let Some(dir) = output {
                settings.export.output_dir = dir;
            }

            let summary = run_export(&settings, only).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&settings, &summary);
            }
        }

        Commands::Check { key_file } => {
            let key_path = key_file.unwrap_or_else(|| settings.api.key_path.clone());
            let credential = FileCredentialLoader::new(key_path)
                .load()
                .await
                .context("failed to load API key")?;
            println!("API key loaded for datacenter: {}", credential.datacenter());

            let api = HttpMarketingApi::new(&credential, &settings.api)?;
            println!("Pinging {} ...", api.base_url());
            api.ping().await.context("API ping failed")?;
            println!("API reachable.");
        }

        Commands::Resources => {
            println!("{:<18} OUTPUT FOLDER", "RESOURCE");
            for kind in ResourceKind::ALL {
                println!("{:<18} {}/", kind.name(), kind.dir());
            }
        }
    }

    Ok(())
}

async fn run_export(settings: &Settings, only: Vec<ResourceKind>) -> anyhow::Result<ExportSummary> {
    let credential = FileCredentialLoader::new(settings.api.key_path.clone())
        .load()
        .await
        .context("failed to load API key")?;

    let api = HttpMarketingApi::new(&credential, &settings.api)?;
    let sink = FileExportSink::new(settings.export.output_dir.clone());
    let use_case = ExportUseCase::new(Arc::new(api), Arc::new(sink), settings.export.clone());

    let mut kinds = if only.is_empty() {
        ResourceKind::ALL.to_vec()
    } else {
        only
    };
    // Only for the progress bar length; execute_kinds orders and dedups itself
    kinds.sort();
    kinds.dedup();

    info!(
        output = %settings.export.output_dir.display(),
        resources = kinds.len(),
        "starting export"
    );

    let pb = ProgressBar::new(kinds.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let pb_clone = pb.clone();
    let progress = move |event: ExportEvent| match event {
        ExportEvent::Started(kind) => pb_clone.set_message(format!("exporting {}", kind)),
        ExportEvent::Finished(kind, stats) => {
            pb_clone.inc(1);
            pb_clone.println(format!(
                "  {:<18} {} exported, {} skipped",
                kind.name(),
                stats.items,
                stats.skipped
            ));
        }
    };

    let result = use_case.execute_kinds(&kinds, progress).await;
    pb.finish_and_clear();

    result.map_err(|e| {
        error!(error = %e, "export aborted");
        anyhow::Error::new(e).context("export failed")
    })
}

fn print_summary(settings: &Settings, summary: &ExportSummary) {
    println!();
    println!("Export complete: {}", settings.export.output_dir.display());
    for (kind, stats) in &summary.resources {
        println!("  {:<18} {:>6} items", kind.name(), stats.items);
    }
    println!("  Total:             {:>6} items", summary.total_items());
    if summary.total_skipped() > 0 {
        println!(
            "  {} detail requests failed and were skipped (see log)",
            summary.total_skipped()
        );
    }
}
