use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use hyper::header::HeaderValue;
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use quizwheel_core::{WheelConfig, load_config};
use quizwheel_server::{AppState, RateLimiter, serve};

#[derive(Debug, Parser)]
#[command(name = "quizwheel-server", version = "0.1.0")]
#[command(about = "Quiz results, statistics and the once-per-day wheel of fortune over HTTP")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// SQLite database path (`:memory:` keeps data in process)
    #[arg(long, default_value = ":memory:")]
    database: String,

    /// Optional JSON file with wheel settings (win_odds, utc_offset_minutes, max_identifier_len)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Value sent as `Access-Control-Allow-Origin` (`*` allows any origin)
    #[arg(long, default_value = "*")]
    cors_origin: String,

    /// Requests per minute allowed per client address (0 disables throttling)
    #[arg(long, default_value_t = 60)]
    rate_limit: u32,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let cfg = resolve_config(&args)?;
    announce_banner(&args, &cfg);

    let cors_origin = HeaderValue::from_str(&args.cors_origin)
        .with_context(|| format!("invalid --cors-origin {:?}", args.cors_origin))?;
    let mut state = AppState::sqlite(&args.database, &cfg)
        .with_context(|| format!("opening database {}", args.database))?
        .with_cors_origin(cors_origin);
    if args.rate_limit > 0 {
        state = state.with_limiter(RateLimiter::per_minute(args.rate_limit));
    }

    serve(args.bind, Arc::new(state), shutdown_signal())
        .await
        .with_context(|| format!("serving on {}", args.bind))?;

    info!("server stopped");
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn resolve_config(args: &Args) -> Result<WheelConfig> {
    let Some(path) = args.config.as_deref() else {
        return Ok(WheelConfig::default());
    };
    load_config(path).with_context(|| format!("loading config {}", path.display()))
}

fn announce_banner(args: &Args, cfg: &WheelConfig) {
    println!("{}", "🎡 Quiz Wheel Server".bright_cyan().bold());
    println!("{}", "====================".cyan());
    println!("  bind:        {}", args.bind);
    println!("  database:    {}", args.database);
    println!("  win odds:    1 in {}", cfg.win_odds);
    println!("  utc offset:  {} min", cfg.utc_offset_minutes);
    println!("  cors origin: {}", args.cors_origin);
    if args.rate_limit == 0 {
        println!("  rate limit:  {}", "disabled".yellow());
    } else {
        println!("  rate limit:  {}/min per client", args.rate_limit);
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        log::warn!("ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
