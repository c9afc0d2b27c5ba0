// Guided Triage - command line entry point
//
// Drives one consultation end to end: selects a hospital, sends the given
// symptoms, completes user-actionable tasks as they start and prints the
// recommendations once the result stage is reached.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use guided_triage::services::flow::CONFIDENCE_STEP_INDEX;
use guided_triage::{
    Catalog, FlowConfig, FlowEvent, FlowService, MessageOrigin, RandomSampler, Stage,
};

/// Filler turns used when fewer symptoms than intake turns are given
const FOLLOW_UPS: &[&str] = &[
    "It started about two days ago.",
    "It gets worse when I breathe deeply.",
    "I have not had anything like this before.",
];

#[derive(Parser, Debug)]
#[command(name = "guided-triage", version, about = "Run a guided triage consultation")]
struct Args {
    /// Flow configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Catalog file (JSON); the built-in catalog is used when omitted
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Delay multiplier applied to every pacing delay
    #[arg(short, long, default_value_t = 0.05)]
    speed: f64,

    /// Seed for the progress sampler
    #[arg(long)]
    seed: Option<u64>,

    /// Hospital id to consult
    #[arg(long, default_value = "zrfy")]
    hospital: String,

    /// Symptom text; repeat for several turns
    #[arg(short = 'm', long = "symptom")]
    symptoms: Vec<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("guided_triage=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = match &args.config {
        Some(path) => FlowConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => FlowConfig::default(),
    }
    .scaled(args.speed);

    let catalog = match &args.catalog {
        Some(path) => Catalog::from_file(path)
            .with_context(|| format!("loading catalog from {}", path.display()))?,
        None => Catalog::builtin(),
    };

    let service = match args.seed {
        Some(seed) => {
            let sampler = RandomSampler::seeded(config.min_increment, config.max_increment, seed)?;
            FlowService::with_sampler(catalog, config, Arc::new(sampler))?
        }
        None => FlowService::new(catalog, config)?,
    };

    tokio::time::timeout(Duration::from_secs(args.timeout), run(&service, &args))
        .await
        .context("consultation did not finish in time")?
}

async fn run(service: &FlowService, args: &Args) -> Result<()> {
    let mut events = service.subscribe();

    service.select_hospital(&args.hospital).await?;

    // The hospital acknowledgement takes one intake turn
    let needed = service.config().intake_turns.saturating_sub(1).max(1);
    let mut turns: Vec<String> = args.symptoms.clone();
    let mut filler = FOLLOW_UPS.iter().cycle();
    while turns.len() < needed {
        if let Some(text) = filler.next() {
            turns.push(text.to_string());
        }
    }
    for text in &turns {
        service.send_message(text).await?;
    }

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "event stream lagged");
                continue;
            }
            Err(RecvError::Closed) => bail!("flow stopped before reaching results"),
        };

        match event {
            FlowEvent::MessageAppended { message } => {
                let who = match message.origin {
                    MessageOrigin::User => "you",
                    MessageOrigin::Assistant => "assistant",
                    MessageOrigin::System => "system",
                };
                if !args.json {
                    println!("[{}] {}", who, message.content);
                }
            }
            FlowEvent::StepStarted { step_id, .. } => info!(step = %step_id, "step started"),
            FlowEvent::TaskStarted {
                step_index,
                task_id,
            } => complete_if_actionable(service, step_index, &task_id).await,
            FlowEvent::ConfidenceUpdated { confidence, .. } => {
                info!(confidence, "confidence updated")
            }
            FlowEvent::StepCompleted { step_id, .. } => info!(step = %step_id, "step completed"),
            FlowEvent::StageChanged {
                to: Stage::Result, ..
            } => break,
            other => debug!(kind = other.kind(), "event"),
        }
    }

    let Some(handoff) = service.recommendations().await else {
        bail!("no recommendations available");
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&handoff)?);
        return Ok(());
    }

    println!();
    println!("Recommendations for {}", handoff.hospital.name);
    for rec in &handoff.recommendations {
        println!("  {} ({}% match) - {}", rec.name, rec.confidence, rec.location);
        println!("    {}", rec.reason);
        for doctor in &rec.doctors {
            println!("    {} {}: {}", doctor.title, doctor.name, doctor.specialty);
        }
    }
    Ok(())
}

/// Supply the input a user-actionable task asks for
async fn complete_if_actionable(service: &FlowService, step_index: usize, task_id: &str) {
    if step_index != CONFIDENCE_STEP_INDEX {
        return;
    }
    let snapshot = service.snapshot().await;
    let Some(step) = snapshot.steps.get(step_index) else {
        return;
    };
    let actionable = step
        .task(task_id)
        .map_or(false, |task| task.allows_user_action);
    if actionable {
        if let Err(e) = service.handle_task_action(&step.id, task_id).await {
            warn!(task = task_id, error = %e, "task action rejected");
        }
    }
}
