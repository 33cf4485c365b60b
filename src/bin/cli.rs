//! CLI binary for cadence.

use anyhow::Context;
use cadence::bot::{Delivery, bot_channel};
use cadence::channels::{MessageSender, RecordingSender, TwilioWhatsApp, run_gateway};
use cadence::config::{ConfigIssueSeverity, Requirement, validate_config};
use cadence::scheduler::{DailyTrigger, Scheduler};
use cadence::store::JsonFileStore;
use cadence::{Bot, BotConfig, TaskPlan};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Requests that can queue up in front of the bot task.
const REQUEST_QUEUE: usize = 32;

/// Cadence: daily study reminders over WhatsApp.
#[derive(Parser)]
#[command(name = "cadence", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment file loaded before reading the environment. A missing
    /// file is ignored.
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run the webhook server and the daily scheduler.
    Serve,

    /// Send today's task now, for external cron hosts.
    Dispatch {
        /// Send even if a message already went out today.
        #[arg(long)]
        force: bool,
        /// Print the message instead of sending it. The state file is not
        /// touched.
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply a reply as if it came in through the webhook.
    Reply {
        /// Reply text, e.g. "I'll do it".
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Print the acknowledgment instead of sending it. The state file
        /// is not touched.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show progress.
    Status {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Send a test message to check provider settings.
    Ping {
        /// Only verify the credentials against the provider; send nothing.
        #[arg(long)]
        check: bool,
    },

    /// Write a fresh state file from a plan file.
    Init {
        /// JSON object mapping day numbers to task text.
        #[arg(long)]
        plan: PathBuf,
        /// Replace an existing state file.
        #[arg(long)]
        overwrite: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Before the runtime starts any threads.
    load_env_file(&cli.env_file)?;

    let config = BotConfig::load(cli.config.as_deref())?;
    let _log_guard = cadence::logging::init_tracing(&config.logging)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start tokio runtime")?;
    runtime.block_on(run(cli.command, config))
}

fn load_env_file(path: &Path) -> anyhow::Result<()> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(anyhow::anyhow!(
            "cannot load env file {}: {err}",
            path.display()
        )),
    }
}

async fn run(command: Command, config: BotConfig) -> anyhow::Result<()> {
    match command {
        Command::Serve => run_serve(config).await,
        Command::Dispatch { force, dry_run } => run_dispatch(config, force, dry_run).await,
        Command::Reply { text, dry_run } => run_reply(config, &text.join(" "), dry_run).await,
        Command::Status { json } => run_status(&config, json),
        Command::Ping { check } => run_ping(config, check).await,
        Command::Init { plan, overwrite } => run_init(&config, &plan, overwrite),
    }
}

/// Log every issue; fail if any is blocking.
fn check_config(config: &BotConfig, requirement: Requirement) -> anyhow::Result<()> {
    let mut blocking = 0usize;
    for issue in validate_config(config, requirement) {
        match issue.severity {
            ConfigIssueSeverity::Warning => warn!("{}: {}", issue.title, issue.summary),
            ConfigIssueSeverity::Error => {
                error!("{}: {}", issue.title, issue.summary);
                blocking += 1;
            }
        }
    }
    if blocking > 0 {
        anyhow::bail!("configuration has {blocking} blocking issue(s)");
    }
    Ok(())
}

fn build_bot(config: &BotConfig, dry_run: bool) -> anyhow::Result<Bot> {
    let (requirement, delivery) = if dry_run {
        (Requirement::Local, Delivery::DryRun)
    } else {
        (Requirement::Provider, Delivery::Provider)
    };
    check_config(config, requirement)?;
    Ok(Bot::for_delivery(config, delivery)?)
}

async fn run_serve(config: BotConfig) -> anyhow::Result<()> {
    check_config(&config, Requirement::Server)?;
    let sender: Arc<dyn MessageSender> = Arc::new(TwilioWhatsApp::new(&config.provider)?);
    let bot = Bot::from_config(&config, sender)?;

    // Surface a missing or broken state file before accepting traffic.
    let status = bot.status()?;
    match bot.check_sender().await {
        Ok(true) => {}
        Ok(false) => warn!("provider rejected the credentials; sends will fail"),
        Err(e) => warn!("provider health check failed: {e}"),
    }
    info!(
        "cadence v{} serving day {} of {} (streak {})",
        env!("CARGO_PKG_VERSION"),
        status.current_day,
        status.total_days,
        status.streak
    );

    let (handle, server) = bot_channel(bot, REQUEST_QUEUE);
    let bot_task = server.spawn();
    let cancel = CancellationToken::new();

    let trigger = DailyTrigger::new(config.schedule.daily_hour, config.timezone()?)?;
    let scheduler_task = Scheduler::new(trigger, handle.clone(), cancel.clone()).run();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal_cancel.cancel();
        }
    });

    let served = run_gateway(
        &config.gateway,
        handle,
        config.schedule.force_send,
        cancel.clone(),
    )
    .await;
    cancel.cancel();

    if let Err(e) = scheduler_task.await {
        warn!("scheduler task ended abnormally: {e}");
    }
    if let Err(e) = bot_task.await {
        warn!("bot task ended abnormally: {e}");
    }
    served
}

async fn run_dispatch(config: BotConfig, force: bool, dry_run: bool) -> anyhow::Result<()> {
    let bot = build_bot(&config, dry_run)?;
    let outcome = bot
        .dispatch(config.schedule.on_demand_force(force))
        .await?;
    println!("{outcome}");
    Ok(())
}

async fn run_reply(config: BotConfig, text: &str, dry_run: bool) -> anyhow::Result<()> {
    let bot = build_bot(&config, dry_run)?;
    let report = bot.handle_reply(text).await?;
    println!("{}", report.confirmation);
    if let Some(transition) = report.transition {
        if !transition.acknowledged {
            warn!("acknowledgment was not delivered");
        }
        println!("\n{}", transition.status);
    }
    Ok(())
}

fn run_status(config: &BotConfig, json: bool) -> anyhow::Result<()> {
    check_config(config, Requirement::Local)?;
    let bot = Bot::from_config(config, Arc::new(RecordingSender::new()))?;
    let status = bot.status()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{status}");
    }
    Ok(())
}

async fn run_ping(config: BotConfig, check: bool) -> anyhow::Result<()> {
    let bot = build_bot(&config, false)?;
    if check {
        if !bot.check_sender().await? {
            anyhow::bail!("provider rejected the configured credentials");
        }
        println!("provider credentials accepted");
        return Ok(());
    }
    let message_id = bot.ping().await?;
    println!("sent test message {message_id}");
    Ok(())
}

fn run_init(config: &BotConfig, plan_path: &Path, overwrite: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(plan_path)
        .with_context(|| format!("cannot read plan file {}", plan_path.display()))?;
    let plan = TaskPlan::from_json_str(&raw)?;
    let days = plan.len();
    let store = JsonFileStore::new(config.state.path.clone());
    store.create(plan, overwrite)?;
    println!(
        "wrote {} with {days} day(s), starting at day 1",
        store.path().display()
    );
    Ok(())
}
