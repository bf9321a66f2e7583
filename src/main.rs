use clap::{Parser, Subcommand};
use sqlx::PgPool;
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wqp_seeder::config::Config;
use wqp_seeder::db::{self, Repository};
use wqp_seeder::program::WqpProgram;
use wqp_seeder::scheduler::Scheduler;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration
    #[arg(long, default_value = "config/config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the Stations and Results tables
    Createdb,
    /// Load the CSV exports under <FILE_LOCATION>/<data source>/
    Seed { file_location: PathBuf },
    /// Fetch and load everything sampled since the last stored sample date
    Update,
    /// Run the update on the configured schedule until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wqp_seeder=debug,sqlx=warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration: {}\n\n\
             Make sure:\n\
             1. {} exists\n\
             2. All required environment variables are set (check .env.example)\n\
             3. Create a .env file if needed",
            e,
            cli.config.display()
        )
    })?;
    info!("Configuration loaded");

    let pool = connect(&config).await?;
    let repository = Repository::new(pool).with_batch_size(config.seed.batch_size);

    match cli.command {
        Commands::Createdb => {
            repository.run_migrations().await?;
        }
        Commands::Seed { file_location } => {
            let mut program = WqpProgram::new(repository, &config)?
                .with_file_location(&file_location, &config.seed.data_source)?;
            program.seed().await?;
            info!("Seed finished");
        }
        Commands::Update => {
            let mut program = WqpProgram::new(repository, &config)?;
            program.update().await?;
            info!("Update finished");
        }
        Commands::Watch => {
            let scheduler_config = config.scheduler.clone().ok_or_else(|| {
                anyhow::anyhow!("watch requires a scheduler section in {}", cli.config.display())
            })?;
            let program = WqpProgram::new(repository, &config)?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                shutdown_signal().await;
                let _ = shutdown_tx.send(true);
            });

            let mut scheduler = Scheduler::new(program, &scheduler_config, shutdown_rx);
            if let Err(e) = scheduler.run().await {
                error!("Scheduler error: {}", e);
            }
            info!("Watch shutting down");
        }
    }

    Ok(())
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let pool = db::connect(&config.database).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to connect to database: {}\n\n\
             Host: {}:{}\n\
             Database: {}\n\
             User: {}\n\n\
             Common fixes:\n\
             1. Ensure PostgreSQL is running with PostGIS available\n\
             2. Check username/password are correct (DB_USER, DB_PASSWORD)\n\
             3. Verify database exists: createdb {}\n\
             4. Check host and port (DB_HOST, DB_PORT)",
            e,
            config.database.host,
            config.database.port,
            config.database.name,
            config.database.user,
            config.database.name
        )
    })?;

    info!(
        "Connected to database: {}@{}:{}/{}",
        config.database.user, config.database.host, config.database.port, config.database.name
    );
    Ok(pool)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
