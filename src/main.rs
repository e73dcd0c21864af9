use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use propagator::config::Config;
use propagator::orchestrator::{Orchestrator, PoolConfig};
use propagator::queue::RedisQueue;
use propagator::scheduler::Scheduler;
use propagator::scraper::ScrapeService;
use propagator::storage::MemoryArticleRepository;
use propagator::task::{TaskService, TaskType};
use propagator::worker::WorkerFactory;

#[derive(Parser)]
#[command(
    name = "propagator",
    version,
    about = "Cron-driven stock news ingestion engine",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "config.json")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and registered worker pools until interrupted
    Run {
        /// Scraper pool size
        #[arg(long, default_value = "4")]
        scrapers: usize,

        /// Consumer pool size
        #[arg(long, default_value = "2")]
        consumers: usize,

        /// Source to scrape
        #[arg(long, default_value = "yahoo")]
        source: String,
    },

    /// Seed the scrape queue with every enabled symbol and exit
    Seed {
        /// Source to scrape
        #[arg(long, default_value = "yahoo")]
        source: String,
    },

    /// Fire one registered job immediately
    Trigger {
        /// Job name
        job: String,
    },

    /// Print queue depths and job declarations
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = Config::from_file(&cli.config)?;
    tracing::info!(app = %config.app.name, config = %cli.config, "propagator starting");

    match cli.command {
        Commands::Run {
            scrapers,
            consumers,
            source,
        } => run(&config, scrapers, consumers, &source).await?,
        Commands::Seed { source } => seed(&config, &source).await?,
        Commands::Trigger { job } => trigger(&config, &job).await?,
        Commands::Status => status(&config).await?,
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("propagator=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("propagator=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}

/// Build the service graph shared by all commands
fn build_services(config: &Config) -> Result<(Arc<TaskService>, Arc<WorkerFactory>)> {
    let queue = Arc::new(RedisQueue::new(&config.redis).context("failed to create Redis pool")?);
    let tasks = Arc::new(TaskService::new(queue, config.stock_list.clone()));

    // Site extraction and the relational write path are capabilities
    // supplied by embedding programs; the stock binary runs with an
    // empty scrape registry and an in-memory repository.
    let scraper = Arc::new(ScrapeService::new(Arc::clone(&tasks)));
    let repository = Arc::new(MemoryArticleRepository::new());

    let factory = Arc::new(WorkerFactory::new(
        scraper,
        Arc::clone(&tasks),
        repository,
    ));

    Ok((tasks, factory))
}

/// Register the scraper and consumer pools every long-lived command uses
async fn register_default_pools(
    orchestrator: &Orchestrator,
    scrapers: usize,
    consumers: usize,
    source: &str,
) -> Result<()> {
    orchestrator
        .register_pool(PoolConfig {
            pool_size: scrapers,
            worker_kind: "Scraper".to_string(),
            job_name: "news-scraper".to_string(),
            cron_expr: "0 */5 * * * *".to_string(),
            source: source.to_string(),
            task_type: Some(TaskType::Scrape),
            enabled: scrapers > 0,
        })
        .await?;

    orchestrator
        .register_pool(PoolConfig {
            pool_size: consumers,
            worker_kind: "Consumer".to_string(),
            job_name: "news-consumer".to_string(),
            cron_expr: "30 */5 * * * *".to_string(),
            source: source.to_string(),
            task_type: Some(TaskType::Consume),
            enabled: consumers > 0,
        })
        .await?;

    Ok(())
}

async fn run(config: &Config, scrapers: usize, consumers: usize, source: &str) -> Result<()> {
    let (tasks, factory) = build_services(config)?;

    let scheduler = Arc::new(Scheduler::from_config(&config.scheduler)?);
    let orchestrator = Orchestrator::new(Arc::clone(&scheduler), factory, tasks);

    register_default_pools(&orchestrator, scrapers, consumers, source).await?;

    orchestrator.start();
    tracing::info!("orchestrator running, press Ctrl+C to exit");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("shutdown signal received");
    orchestrator.stop();

    Ok(())
}

async fn seed(config: &Config, source: &str) -> Result<()> {
    let (tasks, _) = build_services(config)?;

    let added = tasks.seed_all(TaskType::Scrape, source).await?;
    println!("Seeded {added} scrape task(s) for source '{source}'");

    Ok(())
}

async fn trigger(config: &Config, job: &str) -> Result<()> {
    let (tasks, factory) = build_services(config)?;

    let scheduler = Arc::new(Scheduler::from_config(&config.scheduler)?);
    let orchestrator = Orchestrator::new(Arc::clone(&scheduler), factory, tasks);
    register_default_pools(&orchestrator, 4, 2, "yahoo").await?;

    orchestrator.run_job(job)?;
    println!("Triggered job '{job}'");

    // Give the fired handler a window to run before the process exits
    loop {
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        let snapshot = scheduler.job_status(job)?;
        if snapshot.status != propagator::scheduler::JobStatus::Running {
            println!(
                "Job '{}' finished: {} ({:?})",
                job,
                snapshot.status,
                snapshot.last_run_time.unwrap_or_default()
            );
            break;
        }
    }

    Ok(())
}

async fn status(config: &Config) -> Result<()> {
    let (tasks, _) = build_services(config)?;

    println!("Queues:");
    for task_type in [TaskType::Scrape, TaskType::Consume] {
        let pending = tasks.pending(task_type).await?;
        println!("  {}: {} pending", task_type.queue_name(), pending);
    }

    println!("\nConfigured jobs:");
    for job in &config.scheduler.jobs {
        println!(
            "  {} [{}] cron='{}' timeout={}s retries={} - {}",
            job.name,
            if job.enabled { "enabled" } else { "disabled" },
            job.cron_expr,
            job.timeout,
            job.retry_count,
            job.description,
        );
    }

    Ok(())
}
