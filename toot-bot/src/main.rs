//! toot-bot - Telegram to Mastodon relay daemon
//!
//! Runs the Telegram front end and the drain scheduler side by side.
//! Messages buffered over chat become durable queue items, and the
//! scheduler trickles them out to each user's Mastodon account as the
//! remote cooldown allows.

mod bot;
mod notify;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use libtootbox::logging::{LogFormat, LoggingConfig};
use libtootbox::mastodon::MastodonGateway;
use libtootbox::{
    Config, Database, DrainScheduler, InputAccumulator, Outbox, Result, SettingsStore,
    TootboxError,
};
use teloxide::Bot;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "toot-bot")]
#[command(version)]
#[command(about = "Telegram to Mastodon relay daemon")]
#[command(long_about = "\
toot-bot - Telegram to Mastodon relay daemon

DESCRIPTION:
    toot-bot is a long-running daemon that accepts messages over
    Telegram DMs, buffers them into per-user posts, and relays queued
    posts to each user's Mastodon account.

    Posting is paced by the remote account itself: a queued post goes
    out only when the configured cooldown has elapsed since the
    account's most recent original (non-reply) status, so posts made
    from other apps count too.

USAGE:
    # Run in foreground (logs to stderr)
    toot-bot

    # Enable verbose logging
    toot-bot --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes current cycle)

CONFIGURATION:
    Configuration file: ~/.config/tootbox/config.toml
    Database location: ~/.local/share/tootbox/outbox.db

    [database]
    path = \"~/.local/share/tootbox/outbox.db\"

    [telegram]
    token_file = \"~/.config/tootbox/telegram.token\"

    [relay]
    cooldown = \"4h\"       # spacing between a user's posts
    poll_interval = \"5m\"  # how often queues are checked

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error

For more information, visit: https://github.com/tootbox/tootbox
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to check the queues (default: from config)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run one drain cycle and exit (for testing)
    #[arg(long, hide = true)]
    #[arg(help = "Run one drain cycle without the bot and exit (for testing)")]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    info!("toot-bot daemon starting");

    let outbox = Outbox::new(db.clone());
    let settings = SettingsStore::new(db);

    let cooldown = chrono::Duration::from_std(config.relay.cooldown_duration()?)
        .map_err(|e| TootboxError::InvalidInput(format!("relay.cooldown out of range: {}", e)))?;
    let gateway = Arc::new(MastodonGateway::new(cooldown));

    let poll_interval = match cli.poll_interval {
        Some(seconds) => std::time::Duration::from_secs(seconds),
        None => config.relay.poll_interval_duration()?,
    };
    info!(interval = ?poll_interval, "poll interval");

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    if cli.once {
        let scheduler = DrainScheduler::new(
            outbox,
            settings,
            gateway.clone(),
            gateway,
            Arc::new(libtootbox::NullNotifier),
        );
        scheduler.run_cycle().await?;
        info!("toot-bot: ran one drain cycle, exiting");
        return Ok(());
    }

    let token = config.telegram.read_token()?;
    let telegram = Bot::new(token);

    let state = Arc::new(bot::AppState::new(
        outbox.clone(),
        settings.clone(),
        InputAccumulator::new(),
    ));

    let scheduler = DrainScheduler::new(
        outbox,
        settings,
        gateway.clone(),
        gateway,
        Arc::new(notify::TelegramNotifier::new(telegram.clone())),
    );

    let scheduler_shutdown = shutdown.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.run(poll_interval, scheduler_shutdown).await {
            error!(error = %e, "scheduler stopped with error");
        }
    });

    let mut dispatcher = bot::build_dispatcher(telegram, state);
    let shutdown_token = dispatcher.shutdown_token();

    // Relay the signal flag into the dispatcher so long polling stops too
    let dispatcher_shutdown = shutdown.clone();
    tokio::spawn(async move {
        while !dispatcher_shutdown.load(Ordering::Relaxed) {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
        if let Ok(stop) = shutdown_token.shutdown() {
            stop.await;
        }
    });

    dispatcher.dispatch().await;
    shutdown.store(true, Ordering::Relaxed);

    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "scheduler task panicked");
    }

    info!("toot-bot daemon stopped");
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    let format = std::env::var("TOOTBOX_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse::<LogFormat>().ok())
        .unwrap_or(LogFormat::Text);
    let level = std::env::var("TOOTBOX_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    LoggingConfig::new(format, level, verbose).init();
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| TootboxError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

/// No signal wiring off Unix; the process stops only when its long
/// polling is interrupted externally.
#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}
