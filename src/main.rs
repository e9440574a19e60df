//! shardchat - join the configured rooms and log their chat.

use shardchat::ShardManager;
use shardchat::config::Config;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "shardchat.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;
    let client_config = config.client_config();

    info!(
        host = %client_config.server.host,
        port = client_config.server.port,
        tls = client_config.server.tls,
        anonymous = client_config.identity.is_anonymous(),
        rooms = config.rooms.len(),
        "Starting shardchat"
    );

    let manager = ShardManager::new(client_config);
    let events = manager.events();
    events.chat.on(|msg| {
        let chat = &msg.event;
        info!(
            shard = msg.shard_id,
            room = %chat.channel,
            user = %chat.sender.name(),
            action = chat.is_action,
            bits = chat.bits.unwrap_or(0),
            "{}",
            chat.text
        );
    });
    events.notice.on(|msg| {
        let notice = &msg.event;
        info!(
            shard = msg.shard_id,
            room = notice.channel.as_deref().unwrap_or("*"),
            msg_id = notice.msg_id.as_deref().unwrap_or(""),
            "{}",
            notice.text
        );
    });
    events.joined.on(|msg| info!(shard = msg.shard_id, room = %msg.event.name, "Joined"));
    events
        .disconnect
        .on(|msg| warn!(shard = msg.shard_id, reason = ?msg.event, "Shard disconnected"));

    if config.rooms.is_empty() {
        warn!("No rooms configured, nothing to join");
    } else {
        tokio::select! {
            result = manager.join(&config.rooms) => match result {
                Ok(channels) => info!(rooms = channels.len(), shards = manager.shard_count(), "Joined configured rooms"),
                Err(e) if e.is_fatal() => {
                    error!(error = %e, code = e.error_code(), "Giving up");
                    manager.close().await?;
                    return Err(e.into());
                }
                Err(e) => error!(error = %e, code = e.error_code(), "Some rooms could not be joined"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted while joining");
                manager.close().await?;
                return Ok(());
            }
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    manager.close().await?;
    info!("All shards closed");
    Ok(())
}
