//! Command-line front end.

pub mod render;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use crate::api::types::{AgentType, TaskStatus};
use crate::api::{HttpBackend, TaskBackend as _};
use crate::config::Config;
use crate::live::{PushTransport, SseTransport};
use crate::settings::{PreferencesStore, Theme};
use crate::store::{MetricsStore, TaskStore, TrackingConfig};

/// How often the follow loop checks the store for new output.
const FOLLOW_REFRESH: Duration = Duration::from_millis(250);

#[derive(Debug, Parser)]
#[command(
    name = "taskdeck",
    version,
    about = "Submit, track and inspect agent orchestrator tasks"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Submit a task and follow it until it finishes
    Submit(SubmitArgs),
    /// Follow an existing task until it finishes
    Watch(WatchArgs),
    /// Show a task and its log timeline
    Show(ShowArgs),
    /// List past tasks
    History(HistoryArgs),
    /// Show system metrics
    Metrics(MetricsArgs),
    /// Print the raw backend health response
    Health,
    /// Show or change the stored theme
    Theme(ThemeArgs),
}

#[derive(Debug, Parser)]
pub struct SubmitArgs {
    /// Task text
    pub text: String,
    /// Session to attach the task to
    #[arg(long = "session")]
    pub session: Option<String>,
    /// Print the task id and exit without following
    #[arg(long = "no-watch")]
    pub no_watch: bool,
}

#[derive(Debug, Parser)]
pub struct WatchArgs {
    pub task_id: String,
}

#[derive(Debug, Parser)]
pub struct ShowArgs {
    pub task_id: String,
    /// Output in JSON format
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct HistoryArgs {
    /// Filter by status (queued, processing, completed, failed)
    #[arg(long = "status")]
    pub status: Option<TaskStatus>,
    /// Filter by agent type (content, code)
    #[arg(long = "agent-type")]
    pub agent_type: Option<AgentType>,
    /// Case-insensitive match on summary or task id
    #[arg(long = "search")]
    pub search: Option<String>,
    #[arg(long = "page", default_value_t = 1)]
    pub page: u32,
    #[arg(long = "page-size")]
    pub page_size: Option<u32>,
    /// Output in JSON format
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct MetricsArgs {
    /// Output in JSON format
    #[arg(long = "json")]
    pub json: bool,
    /// Refresh every N seconds until interrupted
    #[arg(long = "watch", value_name = "SECS")]
    pub watch: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ThemeAction {
    Light,
    Dark,
    Toggle,
}

#[derive(Debug, Parser)]
pub struct ThemeArgs {
    pub action: Option<ThemeAction>,
}

/// Execute a parsed command.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.cmd {
        Commands::Submit(args) => cmd_submit(&config, args).await,
        Commands::Watch(args) => cmd_watch(&config, args).await,
        Commands::Show(args) => cmd_show(&config, args).await,
        Commands::History(args) => cmd_history(&config, args).await,
        Commands::Metrics(args) => cmd_metrics(&config, args).await,
        Commands::Health => cmd_health(&config).await,
        Commands::Theme(args) => cmd_theme(&config, args).await,
    }
}

fn backend(config: &Config) -> anyhow::Result<Arc<HttpBackend>> {
    Ok(Arc::new(
        HttpBackend::new(config).context("failed to build HTTP client")?,
    ))
}

fn task_store(config: &Config) -> anyhow::Result<TaskStore> {
    let transport: Option<Arc<dyn PushTransport>> = if config.push_enabled {
        Some(Arc::new(SseTransport::new()))
    } else {
        None
    };
    Ok(TaskStore::new(
        backend(config)?,
        transport,
        TrackingConfig::from_config(config),
        config.history_page_size,
    ))
}

async fn cmd_submit(config: &Config, args: SubmitArgs) -> anyhow::Result<()> {
    let store = task_store(config)?;
    let task_id = store
        .execute_task(&args.text, args.session.as_deref())
        .await?;
    println!("Submitted task {}", task_id);

    if args.no_watch {
        store.stop_task_tracking().await;
        return Ok(());
    }
    follow(&store).await
}

async fn cmd_watch(config: &Config, args: WatchArgs) -> anyhow::Result<()> {
    let store = task_store(config)?;
    store.fetch_task_detail(&args.task_id).await?;

    let terminal = store
        .current_task()
        .await
        .is_some_and(|task| task.status.is_terminal());
    if terminal {
        debug!(task_id = %args.task_id, "Task already finished, not tracking");
    } else {
        store.start_task_tracking(&args.task_id).await;
    }
    follow(&store).await
}

/// Print the log timeline as it grows until tracking ends or Ctrl-C.
async fn follow(store: &TaskStore) -> anyhow::Result<()> {
    let mut printed = 0usize;
    let mut last_mode = None;
    let mut ticker = tokio::time::interval(FOLLOW_REFRESH);

    loop {
        let ended = tokio::select! {
            _ = store.wait_for_tracking_end() => true,
            _ = ticker.tick() => false,
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                store.stop_task_tracking().await;
                true
            }
        };

        if let Some(mode) = store.tracking_mode().tracking_mode() {
            if last_mode != Some(mode) {
                eprintln!("{}", render::render_mode(mode));
                last_mode = Some(mode);
            }
        }

        let logs = store.current_task_logs().await;
        for entry in logs.iter().skip(printed) {
            println!("{}", render::render_log_line(entry));
        }
        printed = printed.max(logs.len());

        if ended {
            break;
        }
    }

    if let Some(task) = store.current_task().await {
        println!();
        print!("{}", render::render_task_detail(&task));
    }
    if let Some(anomaly) = store.status_anomaly().await {
        eprintln!(
            "warning: task {} moved from {} back to {}",
            anomaly.task_id, anomaly.from, anomaly.to
        );
    }
    Ok(())
}

async fn cmd_show(config: &Config, args: ShowArgs) -> anyhow::Result<()> {
    let store = task_store(config)?;
    store.fetch_task_detail(&args.task_id).await?;
    let task = store
        .current_task()
        .await
        .with_context(|| format!("task {} was not loaded", args.task_id))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&task)?);
        return Ok(());
    }
    print!("{}", render::render_task_detail(&task));
    println!("\nLogs");
    print!("{}", render::render_logs(&store.current_task_logs().await));
    Ok(())
}

async fn cmd_history(config: &Config, args: HistoryArgs) -> anyhow::Result<()> {
    let store = task_store(config)?;
    store.set_status_filter(args.status).await;
    store.set_agent_type_filter(args.agent_type).await;
    if let Some(search) = args.search.as_deref() {
        store.set_search_filter(search).await;
    }
    if let Some(page_size) = args.page_size {
        store.set_history_page_size(page_size).await;
    }
    store.set_history_page(args.page).await;
    store.load_history().await?;

    let items = store.history().await;
    let meta = store.pagination_meta().await;
    if args.json {
        let value = serde_json::json!({ "items": items, "meta": meta });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    print!("{}", render::render_history(&items, meta.as_ref()));
    Ok(())
}

async fn print_metrics(store: &MetricsStore, json: bool) -> anyhow::Result<()> {
    let Some(metrics) = store.metrics().await else {
        return Ok(());
    };
    if json {
        let value = serde_json::json!({
            "metrics": metrics,
            "usage": store.usage_breakdown().await,
            "percentages": store.usage_percentages().await,
            "daily": store.daily_series().await,
            "health": store.health_text().await,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    print!(
        "{}",
        render::render_metrics(
            &metrics,
            &store.usage_breakdown().await,
            &store.usage_percentages().await,
            &store.daily_series().await,
        )
    );
    Ok(())
}

async fn cmd_metrics(config: &Config, args: MetricsArgs) -> anyhow::Result<()> {
    let store = MetricsStore::new(backend(config)?);

    let Some(secs) = args.watch.filter(|s| *s > 0) else {
        store.fetch_metrics().await?;
        if !args.json {
            println!("{}\n", config.app_name);
        }
        return print_metrics(&store, args.json).await;
    };

    let interval = Duration::from_secs(secs);
    store.start_auto_refresh(interval);
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
            _ = ticker.tick() => {}
        }
        // Give the first refresh of this round a moment to land.
        tokio::time::sleep(FOLLOW_REFRESH).await;
        match store.error().await {
            Some(error) => eprintln!("error: {}", error),
            None => print_metrics(&store, args.json).await?,
        }
    }
    store.stop_auto_refresh();
    Ok(())
}

async fn cmd_health(config: &Config) -> anyhow::Result<()> {
    let backend = backend(config)?;
    let text = backend.get_health_raw().await?;
    println!("{}", text);
    Ok(())
}

async fn cmd_theme(config: &Config, args: ThemeArgs) -> anyhow::Result<()> {
    let store = PreferencesStore::new(&config.data_dir);
    let theme = match args.action {
        None => store.theme().await,
        Some(ThemeAction::Toggle) => store.toggle_theme().await.with_context(|| {
            format!("failed to save {}", store.storage_path().display())
        })?,
        Some(action) => {
            let theme = match action {
                ThemeAction::Dark => Theme::Dark,
                _ => Theme::Light,
            };
            let (changed, previous) = store.set_theme(theme).await.with_context(|| {
                format!("failed to save {}", store.storage_path().display())
            })?;
            debug!(changed, previous = %previous, "Theme updated");
            theme
        }
    };
    println!("{}", theme);
    Ok(())
}
