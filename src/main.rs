use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use jobscope::api::{self, ApiState};
use jobscope::config::{SchedulerConfig, ServiceConfig, SimulationConfig};
use jobscope::scheduler::{Job, JobStats};
use jobscope::shutdown::install_shutdown_handler;
use jobscope::store::{FileJobStore, JobStore};
use jobscope::JobService;

#[derive(Parser, Debug)]
#[command(name = "jobscope")]
#[command(version)]
#[command(about = "A single-node priority job scheduler")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the scheduler and its HTTP API
    Server(ServerArgs),

    /// Print the jobs stored in a snapshot without starting the scheduler
    Inspect(InspectArgs),
}

// =============================================================================
// Server Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServerArgs {
    /// Port for the HTTP API
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Snapshot file holding all jobs
    #[arg(long, default_value = "data/jobs.json")]
    data: PathBuf,

    /// Number of concurrent workers
    #[arg(long, default_value = "3")]
    workers: usize,

    /// Capacity of the work queue between dispatcher and workers
    #[arg(long, default_value = "64")]
    queue_capacity: usize,

    /// Milliseconds between dispatch cycles
    #[arg(long, default_value = "3000")]
    dispatch_interval_ms: u64,

    /// Wall-clock limit for one execution attempt, in milliseconds
    #[arg(long, default_value = "5000")]
    job_timeout_ms: u64,

    /// Failed attempts allowed before a job fails for good
    #[arg(long, default_value = "3")]
    max_retries: u32,

    // === Simulated execution ===
    /// Shortest simulated run time, in milliseconds
    #[arg(long, default_value = "1000")]
    min_work_ms: u64,

    /// Longest simulated run time, in milliseconds
    #[arg(long, default_value = "6000")]
    max_work_ms: u64,

    /// Probability that a completed attempt is reported as failed
    #[arg(long, default_value = "0.1")]
    failure_rate: f64,
}

// =============================================================================
// Inspect Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Snapshot file holding all jobs
    #[arg(long, default_value = "data/jobs.json")]
    data: PathBuf,

    /// Print per-status counts instead of the job list
    #[arg(long)]
    stats: bool,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Server Implementation
// =============================================================================

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let listen_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;

    let config = ServiceConfig::new(args.data, listen_addr)
        .with_scheduler(SchedulerConfig {
            workers: args.workers,
            queue_capacity: args.queue_capacity,
            dispatch_interval_ms: args.dispatch_interval_ms,
            job_timeout_ms: args.job_timeout_ms,
            max_retries: args.max_retries,
        })
        .with_simulation(SimulationConfig {
            min_duration_ms: args.min_work_ms,
            max_duration_ms: args.max_work_ms,
            failure_rate: args.failure_rate,
        });

    tracing::info!(
        listen_addr = %config.listen_addr,
        data = %config.data_path.display(),
        workers = config.scheduler.workers,
        "Starting jobscope"
    );

    let service = Arc::new(JobService::open(&config)?);
    let shutdown = install_shutdown_handler();

    service.start()?;

    let state = ApiState {
        service: service.clone(),
    };
    let served = api::serve(config.listen_addr, state, shutdown.clone()).await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "HTTP server failed");
    }

    service.stop().await?;
    served?;

    tracing::info!("Server exited cleanly");
    Ok(())
}

// =============================================================================
// Inspect Implementation
// =============================================================================

fn run_inspect(args: InspectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let jobs = FileJobStore::new(&args.data).load()?;

    if args.stats {
        let stats = JobStats::from_jobs(&jobs);
        match args.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
            OutputFormat::Table => print_stats(&stats),
        }
        return Ok(());
    }

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&jobs)?),
        OutputFormat::Table => print_jobs(&jobs),
    }
    Ok(())
}

fn print_stats(stats: &JobStats) {
    println!("Total:    {}", stats.total);
    println!("Queued:   {}", stats.queued);
    println!("Enqueued: {}", stats.enqueued);
    println!("Running:  {}", stats.running);
    println!("Done:     {}", stats.done);
    println!("Failed:   {}", stats.failed);
}

fn print_jobs(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }

    println!(
        "{:<8} {:<10} {:<9} {:<8} TITLE",
        "ID", "STATUS", "PRIORITY", "RETRIES"
    );
    println!("{}", "-".repeat(60));
    for job in jobs {
        // Truncate title if too long
        let title = if job.title.chars().count() > 30 {
            format!("{}...", job.title.chars().take(27).collect::<String>())
        } else {
            job.title.clone()
        };
        println!(
            "{:<8} {:<10} {:<9} {:<8} {}",
            job.id,
            job.status.to_string(),
            job.priority,
            job.retries,
            title
        );
    }
    println!();
    println!("{} jobs", jobs.len());
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        // keep stdout clean for `inspect -o json`
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Commands::Server(server_args) => run_server(server_args).await?,
        Commands::Inspect(inspect_args) => run_inspect(inspect_args)?,
    }

    Ok(())
}
