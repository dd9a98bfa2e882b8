use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;

use cpra_review_lib::config::{self, ModelConfig};
use cpra_review_lib::disposition::{self, DocumentDisposition, ExportReadiness, PrivilegeLogEntry};
use cpra_review_lib::input::SessionInput;
use cpra_review_lib::models::EmailId;
use cpra_review_lib::pipeline::query::OllamaClient;
use cpra_review_lib::pipeline::{CpraProcessor, ProcessingStats};
use cpra_review_lib::session::{AuditRecord, ProcessingSession, ReviewSummary};

/// Classify a batch of emails against CPRA requests with a local model
#[derive(Parser, Debug)]
#[command(name = "cpra-review", version, about)]
struct Cli {
    /// JSON file with `requests` and `emails`
    input: PathBuf,

    /// Model name (overrides CPRA_DEFAULT_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Ollama base URL (overrides CPRA_OLLAMA_URL)
    #[arg(long)]
    url: Option<String>,

    /// Accept every machine determination as this reviewer
    #[arg(long, value_name = "REVIEWER")]
    approve: Option<String>,
}

#[derive(Serialize)]
struct Report {
    stats: ProcessingStats,
    summary: ReviewSummary,
    dispositions: Vec<DocumentDisposition>,
    readiness: ExportReadiness,
    production_set: Vec<EmailId>,
    privilege_log: Vec<PrivilegeLogEntry>,
    audit_trail: Vec<AuditRecord>,
}

fn main() -> anyhow::Result<()> {
    cpra_review_lib::init_tracing();
    let cli = Cli::parse();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let mut model_config = ModelConfig::from_env().context("loading model configuration")?;
    if let Some(model) = cli.model {
        model_config.model = model;
    }
    if let Some(url) = cli.url {
        model_config.base_url = url;
    }
    model_config.validate()?;

    let input = SessionInput::load(&cli.input)?;
    let mut session = ProcessingSession::new(input.requests, input.emails)?;

    let client = OllamaClient::from_config(&model_config)?;
    if !client.health_check() {
        bail!("Ollama is not reachable at {}", model_config.base_url);
    }
    if !client.is_model_available(&model_config.model)? {
        bail!("Model {} is not installed in Ollama", model_config.model);
    }

    let processor = CpraProcessor::from_config(&client, &model_config);
    let stats = processor.process_session(
        &mut session,
        Some(&|index: usize, total: usize, id: &EmailId| {
            tracing::info!(email_id = %id, "Analyzing email {}/{}", index + 1, total);
        }),
    );

    if let Some(reviewer) = cli.approve.as_deref() {
        session.batch_approve(reviewer)?;
    }

    let report = Report {
        stats,
        summary: session.summary(),
        dispositions: disposition::dispositions(&session),
        readiness: disposition::export_readiness(&session),
        production_set: disposition::production_set(&session),
        privilege_log: disposition::privilege_log(&session),
        audit_trail: session.audit_trail(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
