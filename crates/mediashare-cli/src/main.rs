//! Mediashare CLI
//!
//! Command-line interface for the channel media repost bot

mod logging;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use mediashare_config::{Config, DEFAULT_LINK_PREFIX};
use mediashare_core::link::share_link;
use mediashare_core::{
    extract_metadata, format_file_size, format_post_with_limit, max_post_chars, InboundMessage,
    MediaArchiver, RepostHandler, RepostSettings,
};
use mediashare_storage::Storage;
use mediashare_telegram::{
    resolve_bot_username, ChannelArchiver, Dispatcher, TelegramClient, TelegramMessage,
    TelegramUpdate,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

const DB_FILE: &str = "mediashare.db";

#[derive(Parser)]
#[command(name = "mediashare")]
#[command(about = "Archive channel media and repost it with share links", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (overrides core.log_level)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot in the foreground
    Start,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Render the repost for a saved Bot API message without sending it
    Preview {
        /// JSON file holding a Message or an Update
        file: PathBuf,
        /// Archived message id used in the share link
        #[arg(short, long, default_value = "1")]
        archived_id: i64,
        /// Bot username (defaults to telegram.bot_username)
        #[arg(short, long)]
        bot_username: Option<String>,
    },

    /// Connectivity checks
    Test {
        #[command(subcommand)]
        action: TestCommands,
    },

    /// Log management
    Logs {
        #[command(subcommand)]
        action: LogCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a configuration template
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show current configuration
    Show,
    /// Validate configuration
    Validate,
}

#[derive(Subcommand)]
enum TestCommands {
    /// Test Telegram bot token
    Telegram,
}

#[derive(Subcommand)]
enum LogCommands {
    /// Show log files and sizes
    List,
    /// Clean up old logs
    Clean {
        /// Keep only N days of logs
        #[arg(short, long, default_value_t = logging::LOG_RETENTION_DAYS)]
        days: u64,
    },
    /// Show last N lines of log
    Tail {
        /// Number of lines to show
        #[arg(short, long, default_value = "50")]
        lines: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            let config = load_config(cli.config.clone())?;
            run_bot(config, cli.log_level).await?;
        }

        Commands::Config { action } => match action {
            ConfigCommands::Init { force } => {
                let path = config_path(cli.config.clone())?;
                create_default_config(&path, force)?;
                println!("Configuration written to {}", path.display());
            }
            ConfigCommands::Show => match load_config(cli.config) {
                Ok(config) => {
                    println!("Current configuration:");
                    print_redacted_config(&config)?;
                }
                Err(e) => eprintln!("Error loading config: {:#}", e),
            },
            ConfigCommands::Validate => match load_config(cli.config) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => eprintln!("Configuration is invalid: {:#}", e),
            },
        },

        Commands::Preview {
            file,
            archived_id,
            bot_username,
        } => {
            let config = load_config(cli.config).ok();
            preview_post(&file, archived_id, bot_username, config.as_ref())?;
        }

        Commands::Test { action } => match action {
            TestCommands::Telegram => {
                let config = load_config(cli.config)?;
                test_telegram_bot(&config).await?;
            }
        },

        Commands::Logs { action } => {
            let config = load_config(cli.config.clone())?;
            let log_dir = get_data_dir(&config).join("logs");
            let manager = logging::LogManager::new(log_dir);
            match action {
                LogCommands::List => {
                    let files = manager.get_log_files()?;
                    let total_size = manager.get_log_size()?;
                    println!("Log files ({} total):\n", format_file_size(total_size));
                    for file in files {
                        let metadata = fs::metadata(&file)?;
                        let modified: chrono::DateTime<chrono::Local> = metadata.modified()?.into();
                        println!(
                            "  {} ({}, modified {})",
                            file.file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .unwrap_or_default(),
                            format_file_size(metadata.len()),
                            modified.format("%Y-%m-%d %H:%M:%S")
                        );
                    }
                }
                LogCommands::Clean { days } => {
                    let removed = manager.cleanup_old_logs(days)?;
                    println!("Cleaned {} old log file(s)", removed);
                }
                LogCommands::Tail { lines } => {
                    let current_log = manager.get_current_log_path();
                    if current_log.exists() {
                        let content = fs::read_to_string(&current_log)?;
                        let all_lines: Vec<&str> = content.lines().collect();
                        let start = all_lines.len().saturating_sub(lines);
                        for line in &all_lines[start..] {
                            println!("{}", line);
                        }
                    } else {
                        println!("No log file found at {}", current_log.display());
                    }
                }
            }
        }
    }

    Ok(())
}

async fn run_bot(config: Config, log_level: Option<String>) -> Result<()> {
    let data_dir = get_data_dir(&config);
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let log_level = log_level
        .or_else(|| config.core.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    let _logging_guard = logging::init_logging(&data_dir.join("logs"), &log_level)?;

    let storage = Storage::new(data_dir.join(DB_FILE)).context("opening storage")?;
    info!("{} media message(s) archived so far", storage.archive_count()?);
    let storage = Arc::new(Mutex::new(storage));

    let client = Arc::new(TelegramClient::new(&config.telegram.bot_token)?);
    let bot_username = resolve_bot_username(&config, &client)
        .await
        .context("resolving bot username")?;

    let archiver: Arc<dyn MediaArchiver> = Arc::new(ChannelArchiver::new(
        client.clone(),
        storage.clone(),
        config.archive.channel_id,
    ));
    let settings = RepostSettings::from_config(&config, &bot_username);
    match settings.destination {
        Some(channel) => info!("Reposting to channel {}", channel),
        None => info!(
            "No repost channel configured; unrouted posts will be handled as {:?}",
            settings.unrouted
        ),
    }
    let handler = RepostHandler::new(archiver, client.clone(), settings);
    let dispatcher = Dispatcher::new(&config, client, handler, storage);

    info!(
        "Starting mediashare as @{} (archive channel {})",
        bot_username, config.archive.channel_id
    );
    dispatcher.poll().await
}

fn config_path(explicit: Option<String>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(PathBuf::from(path)),
        None => Config::default_path().ok_or_else(|| anyhow!("No config directory available")),
    }
}

fn load_config(explicit: Option<String>) -> Result<Config> {
    let path = config_path(explicit)?;
    Config::load(&path).with_context(|| format!("loading config {}", path.display()))
}

fn create_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, Config::template())?;
    Ok(())
}

fn get_data_dir(config: &Config) -> PathBuf {
    if let Some(data_dir) = &config.core.data_dir {
        if data_dir == "~" || data_dir.starts_with("~/") {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            if data_dir == "~" {
                home
            } else {
                home.join(data_dir.trim_start_matches("~/"))
            }
        } else {
            PathBuf::from(data_dir)
        }
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mediashare")
    }
}

fn print_redacted_config(config: &Config) -> Result<()> {
    let mut value = serde_json::to_value(config)?;

    if let Some(token) = value
        .get_mut("telegram")
        .and_then(|t| t.get_mut("bot_token"))
    {
        *token = json!("***REDACTED***");
    }

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn read_preview_message(file: &Path) -> Result<TelegramMessage> {
    let raw = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;

    if let Ok(update) = serde_json::from_str::<TelegramUpdate>(&raw) {
        if let Some(message) = update.channel_post.or(update.message) {
            return Ok(message);
        }
    }

    serde_json::from_str::<TelegramMessage>(&raw)
        .with_context(|| format!("{} is neither a Bot API Message nor Update", file.display()))
}

fn preview_post(
    file: &Path,
    archived_id: i64,
    bot_username: Option<String>,
    config: Option<&Config>,
) -> Result<()> {
    let message = InboundMessage::from(&read_preview_message(file)?);
    if !message.has_media() {
        println!("Message carries no media: it would be skipped.");
        return Ok(());
    }

    let bot_username = bot_username
        .or_else(|| config.and_then(|c| c.telegram.bot_username.clone()))
        .ok_or_else(|| anyhow!("bot username unknown: pass --bot-username"))?;
    let prefix = config
        .map(|c| c.archive.link_prefix.trim().to_string())
        .unwrap_or_else(|| DEFAULT_LINK_PREFIX.to_string());

    let metadata = extract_metadata(&message);
    let link = share_link(&bot_username, &prefix, archived_id);
    let post = format_post_with_limit(&link, &metadata, &bot_username, max_post_chars(&metadata));

    let send_path = match &metadata.thumbnail {
        Some(thumb) => format!("sendPhoto (thumbnail {})", thumb),
        None => "sendMessage (link preview disabled)".to_string(),
    };

    println!("Media:    {}", message.media.kind());
    println!("Send via: {}", send_path);
    println!("Button:   {} -> {}", post.button.text, post.button.url);
    println!();
    println!("{}", post.text);
    Ok(())
}

async fn test_telegram_bot(config: &Config) -> Result<()> {
    let client = TelegramClient::new(&config.telegram.bot_token)?;
    println!("Testing bot {}...", config.telegram.account_tag());

    match client.get_me().await {
        Ok(me) => {
            println!(
                "  ✓ SUCCESS: @{} ({})",
                me.username.as_deref().unwrap_or("unknown"),
                me.first_name.as_deref().unwrap_or("unknown")
            );
            if let Some(configured) = &config.telegram.bot_username {
                if me.username.as_deref() != Some(configured.as_str()) {
                    println!(
                        "  ! telegram.bot_username is '{}' but the token belongs to @{}",
                        configured,
                        me.username.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
        Err(e) => println!("  ✗ FAILED: {:#}", e),
    }
    Ok(())
}
