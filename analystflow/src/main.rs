use analystflow::config::AppConfig;
use analystflow::coordinator::{Coordinator, CoordinatorState, UserSignal};
use analystflow::export::{Destination, ReportExporter, ReportWriter};
use analystflow::ingestion::DocumentIngestor;
use analystflow::observability::{init_tracing, LogFormat, DEFAULT_FILTER};
use analystflow::tools::ToolResult;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "analystflow")]
#[command(version, about = "Business-analysis pipeline over a single document")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "TOML configuration file")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    json_logs: bool,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported documents in a directory
    Find {
        #[arg(help = "Directory to search (defaults to the working directory)")]
        dir: Option<PathBuf>,
    },

    /// Print a short preview of a document
    Preview {
        file: PathBuf,
        #[arg(long, help = "Preview length in characters")]
        length: Option<usize>,
    },

    /// Run the full analysis and export the reports
    Analyze {
        file: PathBuf,
        #[arg(long, short, help = "Output directory or gs:// bucket path")]
        output_dir: Option<String>,
        #[arg(long, help = "Also write the combined report")]
        combined: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Plain
    };
    init_tracing(format, if cli.verbose { "debug" } else { DEFAULT_FILTER });

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let ingestor = DocumentIngestor::new(config.ingestion.clone());

    match cli.command {
        Commands::Find { dir } => {
            let dir = dir.unwrap_or_else(|| config.paths.working_dir.clone());
            let handles = ingestor.find(&dir).await?;
            if handles.is_empty() {
                println!("No supported documents in {}", dir.display());
            }
            for handle in handles {
                println!("{:<40} {:>10}", handle.name, handle.size_display());
            }
        }
        Commands::Preview { file, length } => {
            let artifact = ingestor.read(&file).await?;
            if let Some(warning) = artifact.empty_warning() {
                eprintln!("Warning: {warning}");
            }
            let text = match length {
                Some(max) => analystflow::ingestion::preview(&artifact.text, max),
                None => ingestor.preview(&artifact.text),
            };
            println!("{text}");
        }
        Commands::Analyze {
            file,
            output_dir,
            combined,
        } => analyze(&config, &file, output_dir.as_deref(), combined).await?,
    }

    Ok(())
}

async fn analyze(
    config: &AppConfig,
    file: &Path,
    output_dir: Option<&str>,
    combined: bool,
) -> anyhow::Result<()> {
    let llm = llm_client(config)?;
    let destination = output_dir.map_or_else(
        || Destination::local(&config.paths.output_dir),
        Destination::parse,
    );
    if matches!(destination, Destination::Bucket { .. }) {
        bail!("bucket destinations need an object store; this binary writes local directories only");
    }

    let mut coordinator = Coordinator::from_config(config, llm)?
        .with_exporter(
            ReportExporter::new(ReportWriter::new())
                .with_stems(config.output_keys.clone())
                .with_combined(combined),
        )
        .with_default_destination(destination);

    let steps = [
        UserSignal::OpenFile {
            path: file.to_path_buf(),
        },
        UserSignal::Confirm,
        UserSignal::RunPipeline,
        UserSignal::Confirm,
    ];
    for signal in steps {
        let result = coordinator.handle_signal(signal).await;
        report(&result);
        if result.is_error() {
            bail!("stopped in state {}", coordinator.state());
        }
    }

    if coordinator.state() != CoordinatorState::Done {
        bail!("analysis ended in state {}", coordinator.state());
    }
    Ok(())
}

fn report(result: &ToolResult) {
    match result.kind() {
        Some(kind) => eprintln!("[{}:{}] {}", result.status(), kind.as_str(), result.message()),
        None => println!("{}", result.message()),
    }
}

#[cfg(feature = "http")]
fn llm_client(config: &AppConfig) -> anyhow::Result<std::sync::Arc<dyn analystflow::llm::LlmClient>> {
    let client = analystflow::llm::HttpLlmClient::new(
        config.llm.api_base.clone(),
        config.llm.api_key.clone().unwrap_or_default(),
        std::time::Duration::from_secs(config.llm.request_timeout_secs),
    )?;
    Ok(std::sync::Arc::new(client))
}

#[cfg(not(feature = "http"))]
fn llm_client(_config: &AppConfig) -> anyhow::Result<std::sync::Arc<dyn analystflow::llm::LlmClient>> {
    bail!("analystflow was built without the `http` feature; no model client is available")
}
