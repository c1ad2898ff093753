use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use curate_batch::{
    BatchPipeline, Driver, JobRegistry, MemoryWorkQueue, PipelineConfig, PipelineDeps,
    ScanFilter, ScanRequest,
};
use curate_common::{Config, EntityId, EntityKind};
use curate_domain::{Aggregate, Entity, FileEntry, FileEvent, Resource, ResourceEvent, Ticket, TicketEvent};
use curate_events::{EventHistory, StoredEvent};
use curate_notify::{ChangeRouter, LoggingBus};
use curate_repository::{BatchWriteConfig, EntityRepository, RetryPolicy};
use curate_store::MemoryRecordStore;

#[derive(Parser)]
#[command(name = "curate-worker", about = "Batch maintenance over curated resource metadata")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load entities from a JSONL fixture and run one job over all of them.
    Run {
        /// One entity payload per line.
        #[arg(long)]
        fixture: PathBuf,
        /// Job type to run, e.g. `reindex`.
        #[arg(long)]
        job: String,
        /// Scan a secondary index instead of the table.
        #[arg(long)]
        index: Option<String>,
        /// Scan filter as JSON, e.g. `{"statuses":["PUBLISHED"]}`.
        #[arg(long)]
        filter: Option<String>,
        /// Job parameters as JSON.
        #[arg(long)]
        parameters: Option<String>,
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Rebuild entities from a JSONL fixture of stored events.
    Replay {
        #[arg(long)]
        fixture: PathBuf,
        /// Only replay entities of this kind.
        #[arg(long)]
        kind: Option<EntityKind>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("curate=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    config.log_redacted();

    match cli.command {
        Command::Run {
            fixture,
            job,
            index,
            filter,
            parameters,
            page_size,
        } => {
            let mut request = ScanRequest::new(job);
            if let Some(index) = index {
                request = request.on_index(index);
            }
            if let Some(filter) = filter {
                let filter: ScanFilter = serde_json::from_str(&filter).context("invalid --filter")?;
                request = request.with_filter(filter);
            }
            if let Some(parameters) = parameters {
                request = request
                    .with_parameters(serde_json::from_str(&parameters).context("invalid --parameters")?);
            }
            if let Some(page_size) = page_size {
                request = request.with_page_size(page_size);
            }
            run(&config, &fixture, request).await
        }
        Command::Replay { fixture, kind } => replay(&fixture, kind).await,
    }
}

async fn run(config: &Config, fixture: &Path, request: ScanRequest) -> Result<()> {
    let store = Arc::new(MemoryRecordStore::new());
    let repository =
        EntityRepository::new(store.clone()).with_batch_config(BatchWriteConfig::from(config));

    let entities: Vec<Entity> = read_jsonl(fixture)?
        .iter()
        .map(Entity::from_payload)
        .collect::<Result<_, _>>()
        .with_context(|| format!("invalid entity in {}", fixture.display()))?;
    let report = repository.write_batch(entities).await?;
    info!(
        written = report.written,
        attempts = report.attempts,
        "Fixture loaded"
    );

    let scan_queue = Arc::new(MemoryWorkQueue::new());
    let work_queue = Arc::new(MemoryWorkQueue::new());
    let pipeline = BatchPipeline::new(
        PipelineDeps::builder()
            .store(store)
            .repository(repository)
            .router(Arc::new(ChangeRouter::new(Arc::new(LoggingBus))))
            .registry(Arc::new(JobRegistry::standard()))
            .work_queue(work_queue.clone())
            .scan_queue(scan_queue.clone())
            .config(PipelineConfig::from(config))
            .retry(RetryPolicy::from(config))
            .build(),
    );

    let summary = Driver::new(pipeline, scan_queue, work_queue)
        .run_to_completion(request)
        .await?;
    for failure in &summary.failures {
        println!(
            "FAILED {} {}",
            failure
                .key
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| failure.message_id.clone()),
            failure.error
        );
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn replay(fixture: &Path, only: Option<EntityKind>) -> Result<()> {
    let history = EventHistory::new(Arc::new(MemoryRecordStore::new()));
    let mut entities = BTreeSet::new();

    for line in read_jsonl(fixture)? {
        let stored: StoredEvent = serde_json::from_value(line)
            .with_context(|| format!("invalid stored event in {}", fixture.display()))?;
        if only.is_some_and(|kind| kind != stored.entity_kind) {
            continue;
        }
        let (kind, id) = (stored.entity_kind, stored.entity_id);
        match kind {
            EntityKind::Resource => history.append(kind, id, &stored.decode::<ResourceEvent>()?).await?,
            EntityKind::Ticket => history.append(kind, id, &stored.decode::<TicketEvent>()?).await?,
            EntityKind::File => history.append(kind, id, &stored.decode::<FileEvent>()?).await?,
        };
        entities.insert((kind, id));
    }

    for (kind, id) in entities {
        let report = match kind {
            EntityKind::Resource => replay_one::<Resource>(&history, id).await?,
            EntityKind::Ticket => replay_one::<Ticket>(&history, id).await?,
            EntityKind::File => replay_one::<FileEntry>(&history, id).await?,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

async fn replay_one<A: Aggregate>(history: &EventHistory, id: EntityId) -> Result<serde_json::Value> {
    let events = history.events::<A>(id).await?;
    let entity = A::replay(id, events.clone())
        .with_context(|| format!("history of {} {id} does not replay", A::KIND))?;
    let log: Vec<_> = events.iter().map(|event| entity.log_entry(event)).collect();

    Ok(serde_json::json!({
        "kind": A::KIND,
        "id": id,
        "status": entity.status_name(),
        "events": events.len(),
        "log": log,
    }))
}

fn read_jsonl(path: &Path) -> Result<Vec<serde_json::Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: not JSON", path.display(), n + 1))
        })
        .collect()
}
