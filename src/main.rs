use anyhow::{bail, Context};
use background_service::{
    BackgroundService, MetricsTracker, Orchestrator, OrchestratorOptions, Pacer, PublishPolicy,
    Publisher, ResultStore,
};
use clap::{Parser, Subcommand};
use llm_interface::{ContentGenerator, GeminiProvider};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use strategy_engine::TrendSource;
use tracing_subscriber::EnvFilter;
use trendcaster_core::{required_env, AppConfig, ErrorExt, ErrorReporter, Settings};
use x_client::{SimulatedPlatform, SocialPlatform, XApiClient};

const DEFAULT_LOG_FILTER: &str = "trendcaster=info,background_service=info,llm_interface=info,\
strategy_engine=info,x_client=info,trendcaster_core=info";

/// Trend-driven post generation and publishing
#[derive(Parser)]
#[command(name = "trendcaster")]
#[command(about = "Generate, publish and evaluate trend-driven posts", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ./trendcaster.toml when present)
    #[arg(short, long, env = "TRENDCASTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one cycle now
    Run,
    /// Run a cycle at every configured time of day until interrupted
    Schedule,
    /// Run one cycle against a simulated platform, without posting
    DryRun,
    /// Verify platform credentials
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let reporter = ErrorReporter::new();

    let result = match cli.command {
        Commands::Run => run_once(cli.config).await,
        Commands::Schedule => schedule(cli.config).await,
        Commands::DryRun => dry_run(cli.config).await,
        Commands::Check => check(cli.config).await,
    };

    if let Err(e) = &result {
        if let Some(core) = e.downcast_ref::<trendcaster_core::CoreError>() {
            reporter.report_error(core);
        }
    }
    result
}

/// Cancel `pacer` on Ctrl-C
fn cancel_on_interrupt(pacer: &Pacer) {
    let token = pacer.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            token.cancel();
        }
    });
}

fn build_orchestrator<P: SocialPlatform + Clone>(
    provider: GeminiProvider,
    platform: P,
    settings: &Settings,
    policy: PublishPolicy,
    options: OrchestratorOptions,
    pacer: &Pacer,
) -> Orchestrator<GeminiProvider, P> {
    Orchestrator::new(
        TrendSource::new(),
        ContentGenerator::new(provider),
        Publisher::new(platform.clone(), pacer.clone(), policy),
        MetricsTracker::new(platform, pacer.clone()),
        pacer.clone(),
        options,
    )
    .with_store(ResultStore::new(&settings.results_dir))
}

fn live_orchestrator(
    config: &AppConfig,
    pacer: &Pacer,
) -> anyhow::Result<Orchestrator<GeminiProvider, Arc<XApiClient>>> {
    let settings = &config.settings;
    let provider = GeminiProvider::from_settings(config.credentials.gemini_key.clone(), settings)
        .context("failed to build the Gemini client")?;
    let platform = Arc::new(
        XApiClient::new(&config.credentials, settings).context("failed to build the X client")?,
    );

    Ok(build_orchestrator(
        provider,
        platform,
        settings,
        PublishPolicy::from_settings(settings),
        OrchestratorOptions::from_settings(settings),
        pacer,
    ))
}

async fn run_once(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let pacer = Pacer::new();
    cancel_on_interrupt(&pacer);

    let orchestrator = live_orchestrator(&config, &pacer)?;
    orchestrator.load_previous_performance().await;

    match orchestrator.run().await {
        Some(summary) => {
            println!("{}", summary.hypothesis);
            Ok(())
        }
        None => bail!("run cycle did not complete"),
    }
}

async fn schedule(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let pacer = Pacer::new();

    let orchestrator = live_orchestrator(&config, &pacer)?;
    let service = BackgroundService::from_settings(&config.settings, pacer.clone())?;

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            service.stop();
        }
        std::future::pending::<()>().await
    };

    // start() returns once stop() has cancelled the pacer
    tokio::select! {
        result = service.start(&orchestrator) => result?,
        _ = shutdown => {}
    }
    Ok(())
}

async fn dry_run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = trendcaster_core::load_settings(config_path.as_deref())?;
    let gemini_key = required_env("GEMINI_KEY")?;
    let pacer = Pacer::new();
    cancel_on_interrupt(&pacer);

    let provider = GeminiProvider::from_settings(gemini_key, &settings)
        .context("failed to build the Gemini client")?;
    let policy = PublishPolicy {
        cooldown: Duration::ZERO,
        ..PublishPolicy::from_settings(&settings)
    };
    let options = OrchestratorOptions {
        engagement_wait: Duration::ZERO,
        dry_run: true,
        ..OrchestratorOptions::from_settings(&settings)
    };

    let orchestrator = build_orchestrator(
        provider,
        Arc::new(SimulatedPlatform::new()),
        &settings,
        policy,
        options,
        &pacer,
    );

    let Some(summary) = orchestrator.run().await else {
        bail!("dry run did not complete");
    };

    println!("Generated drafts:");
    for (i, draft) in summary.drafts_generated.iter().enumerate() {
        println!(
            "  {}. [{}] ({} chars) {}",
            i + 1,
            draft.category,
            draft.char_len(),
            draft.text
        );
    }
    if let Some(insights) = &summary.insights {
        println!(
            "Best post: {} ({} likes, {} retweets)",
            insights.best_post.id,
            insights.best_post.likes(),
            insights.best_post.retweets()
        );
    }
    println!("{}", summary.hypothesis);
    Ok(())
}

async fn check(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let client = XApiClient::new(&config.credentials, &config.settings)?;

    match client.get_me().await {
        Ok(user) => {
            println!("Authenticated as @{} ({})", user.username, user.name);
            let (writes, reads) = client.get_rate_limit_status().await;
            println!(
                "Client budget: {}/{} write tokens, {}/{} read tokens",
                writes.available_tokens, writes.max_tokens, reads.available_tokens, reads.max_tokens
            );
            Ok(())
        }
        Err(e) => {
            println!("{}", e.user_friendly_message());
            Err(e.into())
        }
    }
}
