mod config;
mod diagnostics;
mod inbox;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use cosmic_messages_core::{
    render_message, ConversationCache, ConversationList, ConversationLoader, Message,
    MessageWriter, MutationBus, QueryCriteria, RefreshOutcome, SmsMessages, SqliteMessageStore,
    SystemClock, ThreadId,
};
use diagnostics::{BuildInfo, Cli, Command};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

fn open_store(config: &Config, database: Option<&Path>) -> Result<SqliteMessageStore> {
    let path = database
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.database_path());
    SqliteMessageStore::open(&path)
        .with_context(|| format!("Failed to open message database {}", path.display()))
}

fn conversation_list(
    store: &SqliteMessageStore,
    criteria: QueryCriteria,
    cache: Arc<ConversationCache>,
) -> ConversationList<String> {
    let loader = ConversationLoader::new(Arc::new(store.clone())).with_criteria(criteria);
    ConversationList::new(loader, cache)
}

fn read_packet(file: &Path) -> Result<SmsMessages> {
    let mut contents = String::new();
    if file == Path::new("-") {
        std::io::stdin()
            .read_to_string(&mut contents)
            .context("Failed to read packet from stdin")?;
    } else {
        contents = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read packet file {}", file.display()))?;
    }
    SmsMessages::from_json(&contents).context("Failed to decode SMS messages packet")
}

async fn list_conversations(
    config: &Config,
    store: &SqliteMessageStore,
    limit: Option<usize>,
    unread: bool,
    json: bool,
) -> Result<()> {
    let mut criteria = config.query_criteria();
    if let Some(limit) = limit {
        criteria = criteria.with_limit(limit);
    }
    if unread {
        criteria = criteria.unread_only();
    }

    let cache = Arc::new(ConversationCache::with_clock(
        config.freshness_window(),
        Arc::new(SystemClock),
    ));
    let mut list = conversation_list(store, criteria, cache);
    list.refresh(|_, c| output::conversation_row(c))
        .await
        .context("Failed to load conversations")?;

    if json {
        println!("{}", serde_json::to_string_pretty(list.snapshot())?);
    } else if list.presenter().is_empty() {
        println!("No conversations.");
    } else {
        for row in list.presenter().rows() {
            println!("{}", row);
        }
        println!("\nTotal: {} conversations", list.presenter().len());
    }
    Ok(())
}

fn show_thread(store: &SqliteMessageStore, thread_id: ThreadId) -> Result<()> {
    let Some(address) = store.thread_address(thread_id)? else {
        println!("Conversation {} not found.", thread_id);
        return Ok(());
    };

    println!("=== {} (thread {}) ===", address, thread_id);
    let messages = store
        .thread_messages(thread_id)
        .context("Failed to load messages")?;
    if messages.is_empty() {
        println!("No messages.");
    }
    for sms in &messages {
        let message = Message::from(sms);
        let rendered = render_message(&message);
        println!(
            "{}",
            output::message_line(&rendered, &output::format_timestamp(message.timestamp))
        );
    }
    Ok(())
}

/// Pick up writes from other processes and pending inbox packets
async fn sync_store(writer: &MessageWriter, inbox_dir: Option<&Path>) -> Result<()> {
    let writer = writer.clone();
    let inbox_dir = inbox_dir.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || -> Result<()> {
        if writer.detect_external_changes()? {
            debug!("Reloading after an external write");
        }
        if let Some(dir) = inbox_dir {
            let imported = inbox::import_pending(&dir, &writer)?;
            if imported > 0 {
                info!("Imported {} packet files", imported);
            }
        }
        Ok(())
    })
    .await
    .context("Store sync task failed")?
}

async fn watch(
    config: &Config,
    store: SqliteMessageStore,
    interval: Duration,
    inbox_dir: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let cache = Arc::new(ConversationCache::with_clock(
        config.freshness_window(),
        Arc::new(SystemClock),
    ));
    let writer =
        MessageWriter::new(store.clone(), MutationBus::default()).with_cache(cache.clone());
    writer
        .detect_external_changes()
        .context("Failed to read store data version")?;
    let mut list = conversation_list(&store, config.query_criteria(), cache.clone());

    info!(
        "Watching conversations every {:?} (freshness window {:?})",
        interval,
        cache.freshness_window()
    );
    if let Some(dir) = &inbox_dir {
        info!("Polling {} for SMS packets", dir.display());
    }

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sync_store(&writer, inbox_dir.as_deref()).await {
                    warn!("Store sync failed: {:#}", e);
                }

                match list.refresh(|_, c| output::conversation_row(c)).await {
                    Ok(RefreshOutcome::Applied { script, .. }) if !script.is_empty() => {
                        if json {
                            println!("{}", serde_json::to_string(&script)?);
                        } else {
                            for line in output::script_lines(&script) {
                                println!("{}", line);
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Refresh failed: {}", e.user_message()),
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for shutdown signal")?;
                info!("Shutting down");
                break;
            }
        }
    }

    list.cancel_pending();
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    if let Command::Version { verbose } = cli.command {
        BuildInfo::get().display(verbose);
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    if let Command::DumpConfig = cli.command {
        println!("{}", toml::to_string_pretty(&config)?);
        println!("# database: {}", config.database_path().display());
        return Ok(());
    }

    config.ensure_directories()?;
    let store = open_store(&config, cli.database.as_deref())?;
    let writer = MessageWriter::new(store.clone(), MutationBus::default());

    match cli.command {
        Command::List {
            limit,
            unread,
            json,
        } => list_conversations(&config, &store, limit, unread, json).await,
        Command::Show { thread_id } => show_thread(&store, ThreadId(thread_id)),
        Command::Watch {
            interval,
            inbox,
            json,
        } => {
            let interval = interval
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.refresh_interval());
            let inbox = inbox.or_else(|| config.watch.inbox_dir.clone());
            watch(&config, store, interval, inbox, json).await
        }
        Command::Import { file } => {
            let packet = read_packet(&file)?;
            let written = writer
                .import_sms_packet(&packet)
                .context("Failed to import packet")?;
            println!(
                "Imported {} messages in {} conversations.",
                written,
                packet.conversations.len()
            );
            Ok(())
        }
        Command::MarkRead { thread_id } => {
            let changed = writer.mark_thread_read(ThreadId(thread_id))?;
            println!("Marked {} messages as read.", changed);
            Ok(())
        }
        Command::Delete { thread_id } => {
            if writer.delete_thread(ThreadId(thread_id))? {
                println!("Deleted conversation {}.", thread_id);
            } else {
                println!("Conversation {} not found.", thread_id);
            }
            Ok(())
        }
        Command::SetContact { thread_id, name } => {
            if writer.set_contact_name(ThreadId(thread_id), name.as_deref())? {
                println!("Updated conversation {}.", thread_id);
            } else {
                println!("Conversation {} not found.", thread_id);
            }
            Ok(())
        }
        Command::Version { .. } | Command::DumpConfig => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    diagnostics::init_logging(&cli).context("Failed to initialize logging")?;

    let result = run(cli).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
