//! `holobot`: composes the enabled extensions and runs them until interrupted.

use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use tracing::{error, info};

use holobot_runtime::builtin::CoreExtension;
use holobot_runtime::logging::{env_filter, install_tracing, LogFormat};
use holobot_runtime::{ExtensionLoader, RuntimeConfig, ServiceContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PlanFormat {
    Json,
    Dot,
}

#[derive(Debug, Parser)]
#[command(name = "holobot", version, about = "Runs the holobot service graph")]
struct Args {
    /// Instance name used in log output.
    #[arg(long, env = "HOLOBOT_INSTANCE", default_value = "holobot")]
    instance: String,

    /// Startup deadline in seconds.
    #[arg(long, env = "HOLOBOT_STARTUP_TIMEOUT", default_value_t = 30)]
    startup_timeout: u64,

    /// Skip graceful cleanup on shutdown.
    #[arg(long, env = "HOLOBOT_TERMINATE")]
    terminate: bool,

    /// Extensions to skip, comma separated.
    #[arg(long, env = "HOLOBOT_DISABLE", value_delimiter = ',')]
    disable: Vec<String>,

    /// Job scheduler tick in milliseconds.
    #[arg(
        long,
        env = "HOLOBOT_JOB_TICK_MS",
        default_value_t = 1_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    job_tick_ms: u64,

    #[arg(long, env = "HOLOBOT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Filter directive; overrides `RUST_LOG`.
    #[arg(long, env = "HOLOBOT_LOG")]
    log: Option<String>,

    /// Debug output for the holobot crates.
    #[arg(short, long)]
    verbose: bool,

    /// Print the composition plan and exit without starting anything.
    #[arg(long, value_enum)]
    print_plan: Option<PlanFormat>,
}

impl Args {
    fn config(&self) -> RuntimeConfig {
        RuntimeConfig {
            instance_name: self.instance.clone(),
            startup_timeout: Duration::from_secs(self.startup_timeout),
            terminate_on_shutdown: self.terminate,
            disabled_extensions: self.disable.clone(),
            job_tick_interval: Duration::from_millis(self.job_tick_ms),
        }
    }
}

fn loader() -> ExtensionLoader {
    ExtensionLoader::new().with(CoreExtension)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    install_tracing(args.log_format, env_filter(args.log.as_deref(), args.verbose)?)?;

    let config = args.config();
    let (container, report) = loader()
        .compose(&config)
        .context("failed to compose services")?;

    if let Some(format) = args.print_plan {
        let snapshot = container.snapshot();
        match format {
            PlanFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            PlanFormat::Dot => print!("{}", snapshot.to_dot()),
        }
        return Ok(());
    }

    info!(
        extensions = ?report.loaded,
        skipped = ?report.skipped,
        services = container.plan().len(),
        "services composed"
    );

    let ctx = ServiceContext::new(config.clone());
    if let Err(err) = container.start_within(&ctx, config.startup_timeout).await {
        for blocked in &err.blocked {
            error!(%blocked, "service not started");
        }
        if let Some(rollback) = &err.rollback {
            error!(%rollback, "rollback incomplete");
        }
        return Err(err.into());
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("interrupt received, shutting down");

    container.shutdown(config.terminate_on_shutdown).await?;
    Ok(())
}
