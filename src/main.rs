//! Binary entrypoint for the oxmarket CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml` with the stock game tables
//! - `start --user <id> [--name <nick>] [--group <gid>] [--platform <p>]` -
//!   run the game on a console adapter, one stdin line per message
//! - `status` - print the system overview
//! - `backup` / `backups` / `restore <name>` - manage state snapshots
//!
//! See the library crate docs for module-level details: `oxmarket::`.
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use oxmarket::config::Config;
use oxmarket::engine::{automation, Engine, Inbound};
use oxmarket::logutil::escape_log;
use oxmarket::market::ledger::Ledger;
use oxmarket::market::{players, GameContext};
use oxmarket::storage::StateStore;

#[derive(Parser)]
#[command(name = "oxmarket")]
#[command(about = "A chat-command trading and economy game")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Run the game on the console: every stdin line is one chat message
    Start {
        /// User id the console speaks as
        #[arg(short, long, default_value = "console")]
        user: String,
        /// Nickname for that user
        #[arg(short, long)]
        name: Option<String>,
        /// Pretend the messages come from this group
        #[arg(short, long)]
        group: Option<String>,
        /// Platform prefix for player ids
        #[arg(short, long, default_value = "console")]
        platform: String,
    },
    /// Show the system overview
    Status,
    /// Snapshot the state document
    Backup,
    /// List backups, newest first
    Backups,
    /// Replace the state document with a backup
    Restore {
        /// Backup file name as shown by `backups`
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(&None, cli.verbose);
        Config::create_default(&cli.config).await?;
        info!("Configuration file created at {}", cli.config);
        return Ok(());
    }

    let config = Config::load(&cli.config).await?;
    init_logging(&Some(config.clone()), cli.verbose);

    match cli.command {
        Commands::Init => {}
        Commands::Start { user, name, group, platform } => {
            info!("Starting oxmarket v{}", env!("CARGO_PKG_VERSION"));
            let engine = boot(&config).await?;
            let scheduler = automation::spawn(engine.context().clone(), &config.automation);
            let template = Inbound { platform, user_id: user, nickname: name, group_id: group, ..Inbound::default() };
            run_console(&engine, &template).await?;
            info!("shutting down");
            scheduler.shutdown().await;
        }
        Commands::Status => {
            let engine = boot(&config).await?;
            println!("{}", players::system_overview(engine.context()).await);
        }
        Commands::Backup => {
            let engine = boot(&config).await?;
            let ctx = engine.context();
            let meta = ctx.store.snapshot_backup(ctx.now()).await?;
            println!("Backup created: {} ({} bytes)", meta.id, meta.size_bytes);
        }
        Commands::Backups => {
            let engine = boot(&config).await?;
            let backups = engine.context().store.list_backups().await?;
            if backups.is_empty() {
                println!("No backups yet.");
            }
            for b in backups {
                println!("{}  {}  {} bytes  {}", b.id, b.created_at.format("%Y-%m-%d %H:%M:%S"), b.size_bytes, b.checksum);
            }
        }
        Commands::Restore { name } => {
            let engine = boot(&config).await?;
            engine.context().store.restore_backup(&name).await?;
            engine.seed_admins().await?;
            println!("Restored backup {}", name);
        }
    }

    Ok(())
}

/// Open the store, build the engine and seed configured admins. A state file
/// that exists but does not parse stops the process here.
async fn boot(config: &Config) -> Result<Engine> {
    let store = StateStore::open(&config.storage.data_dir, config.storage.backups_to_keep)
        .await
        .with_context(|| format!("failed to open game state in {}", config.storage.data_dir))?;
    let ctx = GameContext::new(Arc::new(store), config.game.clone(), Ledger::new(config.storage.ledger_capacity));
    let engine = Engine::new(ctx, &config.access)?;
    let seeded = engine.seed_admins().await?;
    if seeded > 0 {
        info!("seeded {} admin(s) from config", seeded);
    }
    Ok(engine)
}

/// Split `@user` tokens off a console line as mentions.
fn console_message(template: &Inbound, line: &str) -> Inbound {
    let mut msg = template.clone();
    let mut words = Vec::new();
    for token in line.split_whitespace() {
        match token.strip_prefix('@') {
            Some(user) if !user.is_empty() => msg.mentions.push(user.to_string()),
            _ => words.push(token),
        }
    }
    msg.text = words.join(" ");
    msg
}

async fn run_console(engine: &Engine, template: &Inbound) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("oxmarket ready. Type 'help' for commands, Ctrl-D to quit.");
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let msg = console_message(template, &line);
                    if let Some(reply) = engine.dispatch(&msg).await {
                        println!("{}", reply);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("stdin read failed: {}", escape_log(&e.to_string()));
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    let configured = config
        .as_ref()
        .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    let level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(level);

    let file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| std::fs::OpenOptions::new().create(true).append(true).open(path).ok())
        .map(|f| std::sync::Arc::new(std::sync::Mutex::new(f)));
    let security_path = config.as_ref().and_then(|c| c.logging.security_file.clone());
    let is_tty = atty::is(atty::Stream::Stdout);
    let to_console = file.is_none() || is_tty;

    builder.format(move |fmt, record| {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let line = format!("{} [{}] {}", ts, record.level(), record.args());

        if let Some(ref file) = file {
            if let Ok(mut guard) = file.lock() {
                let _ = writeln!(guard, "{}", line);
            }
        }

        if record.target() == "security" {
            if let Some(ref sec_path) = security_path {
                if let Ok(mut sf) = std::fs::OpenOptions::new().create(true).append(true).open(sec_path) {
                    let _ = writeln!(sf, "{}", line);
                }
            }
        }

        if to_console {
            writeln!(fmt, "{}", line)
        } else {
            Ok(())
        }
    });
    let _ = builder.try_init();
}
