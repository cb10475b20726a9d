//! conveyor-runner — drives one in-process run: a VecConnector publishing a
//! fixed document set through an empty pipeline into a NullBackend.
//!
//! Concrete connectors, pipelines, and index backends are wired by embedding
//! this crate rather than by CLI flag; this binary exists to smoke-test the
//! Runner wiring end to end, the way `ingest-worker` smoke-tests a single
//! eisenbahn worker.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use conveyor_connector::VecConnector;
use conveyor_core::{load_dotenv, Document, RunnerConfig};
use conveyor_indexer::NullBackend;
use conveyor_messenger::InMemoryMessenger;
use conveyor_pipeline::Pipeline;
use conveyor_runner::{ConnectorJob, Runner};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "conveyor-runner", version, about = "Runs a fixed document set through the in-process pipeline")]
struct Cli {
    /// Path to a JSON array of documents to publish via VecConnector.
    #[arg(long, env = "CONVEYOR_DOCUMENTS")]
    documents: PathBuf,

    /// Pipeline/connector name, used for worker naming and logging.
    #[arg(long, env = "CONVEYOR_PIPELINE_NAME", default_value = "default")]
    pipeline: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let documents = match load_documents(&cli.documents) {
        Ok(docs) => docs,
        Err(e) => {
            error!(error = %e, path = %cli.documents.display(), "failed to load documents");
            return ExitCode::from(1);
        }
    };

    let config = RunnerConfig::from_env();
    config.log_summary();

    let messenger = Arc::new(InMemoryMessenger::new(config.worker.queue_capacity));
    let pipeline = Arc::new(Pipeline::new(cli.pipeline.clone(), vec![]));
    let backend = Arc::new(NullBackend::new());
    let connector = Arc::new(VecConnector::new(cli.pipeline.clone(), documents));

    let job = ConnectorJob {
        connector,
        messenger,
        pipeline,
        backend,
    };

    let runner = Runner::new(config);
    match runner.run(vec![job]).await {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn load_documents(path: &PathBuf) -> anyhow::Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)?;
    let docs: Vec<Document> = serde_json::from_str(&content)?;
    Ok(docs)
}
