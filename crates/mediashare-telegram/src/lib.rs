//! Mediashare Telegram Adapter
//!
//! Bot API long-polling with offset persistence and client recreation,
//! channel-post reposting, and `/start` deep-link delivery

pub mod archiver;
pub mod client;
pub mod types;

pub use archiver::ChannelArchiver;
pub use client::TelegramClient;
pub use types::{TelegramMessage, TelegramUpdate, TelegramUser};

use anyhow::Result;
use mediashare_config::{Config, TelegramConfig};
use mediashare_core::link::parse_start_payload;
use mediashare_core::{InboundMessage, RepostHandler, RepostOutcome};
use mediashare_storage::Storage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const OFFSET_CHANNEL: &str = "telegram";
const WELCOME_TEXT: &str = "Hi! Open a share link from the channel to receive its file here.";
const MISSING_FILE_TEXT: &str = "Sorry, that file is no longer available.";

/// What an update asks the bot to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Repost(InboundMessage),
    Start {
        chat_id: i64,
        archived_id: Option<i64>,
    },
    Ignore,
}

/// Resolves the bot's username, preferring the configured value.
pub async fn resolve_bot_username(config: &Config, client: &TelegramClient) -> Result<String> {
    if let Some(username) = config
        .telegram
        .bot_username
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
    {
        return Ok(username.trim_start_matches('@').to_string());
    }

    let me = client.get_me().await?;
    me.username
        .ok_or_else(|| anyhow::anyhow!("getMe returned a bot without username"))
}

pub struct Dispatcher {
    client: Arc<TelegramClient>,
    handler: RepostHandler,
    storage: Arc<Mutex<Storage>>,
    account_tag: String,
    telegram: TelegramConfig,
    archive_chat_id: i64,
    link_prefix: String,
    poll_timeout_secs: u64,
    client_recreate_interval_secs: u64,
}

impl Dispatcher {
    pub fn new(
        config: &Config,
        client: Arc<TelegramClient>,
        handler: RepostHandler,
        storage: Arc<Mutex<Storage>>,
    ) -> Self {
        Self {
            client,
            handler,
            storage,
            account_tag: config.telegram.account_tag().to_string(),
            telegram: config.telegram.clone(),
            archive_chat_id: config.archive.channel_id,
            link_prefix: config.archive.link_prefix.trim().to_string(),
            poll_timeout_secs: config.telegram.poll_timeout_secs.unwrap_or(60),
            client_recreate_interval_secs: config
                .telegram
                .client_recreate_interval_secs
                .unwrap_or(60),
        }
    }

    /// The archive channel is never reposted, even when listed.
    fn is_monitored(&self, chat_id: i64) -> bool {
        chat_id != self.archive_chat_id && self.telegram.is_monitored(chat_id)
    }

    pub fn route(&self, update: &TelegramUpdate) -> Route {
        if let Some(post) = &update.channel_post {
            if !self.is_monitored(post.chat.id) {
                debug!("Skipping post from unmonitored chat {}", post.chat.id);
                return Route::Ignore;
            }
            return Route::Repost(InboundMessage::from(post));
        }

        if let Some(message) = &update.message {
            if !message.is_private() {
                return Route::Ignore;
            }
            let Some(text) = message.text.as_deref().map(str::trim) else {
                return Route::Ignore;
            };
            let mut parts = text.splitn(2, char::is_whitespace);
            let command = parts.next().unwrap_or_default();
            if command != "/start" && !command.starts_with("/start@") {
                return Route::Ignore;
            }
            let archived_id = parts
                .next()
                .and_then(|payload| parse_start_payload(payload, &self.link_prefix));
            return Route::Start {
                chat_id: message.chat.id,
                archived_id,
            };
        }

        Route::Ignore
    }

    async fn read_offset(&self) -> Option<i64> {
        match self
            .storage
            .lock()
            .await
            .get_offset(OFFSET_CHANNEL, &self.account_tag)
        {
            Ok(offset) => offset,
            Err(e) => {
                warn!("Failed to read polling offset: {}", e);
                None
            }
        }
    }

    async fn write_offset(&self, offset: i64) {
        if let Err(e) = self
            .storage
            .lock()
            .await
            .save_offset(OFFSET_CHANNEL, &self.account_tag, offset)
        {
            warn!("Failed to persist polling offset {}: {}", offset, e);
        }
    }

    pub async fn poll(&self) -> Result<()> {
        let mut offset: Option<i64> = self.read_offset().await;

        info!(offset = ?offset, "Telegram polling started");

        let mut http = self.client.http().clone();
        let mut client_recreate_at =
            Instant::now() + Duration::from_secs(self.client_recreate_interval_secs);

        loop {
            if Instant::now() >= client_recreate_at {
                info!("Recreating HTTP client to prevent stale connections");
                http = TelegramClient::build_http_client()?;
                client_recreate_at =
                    Instant::now() + Duration::from_secs(self.client_recreate_interval_secs);
            }

            let updates = match self
                .client
                .get_updates(&http, offset, self.poll_timeout_secs)
                .await
            {
                Ok(v) => v,
                Err(err) => {
                    warn!("Telegram polling error: {}", err);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    continue;
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);
                self.write_offset(update.update_id + 1).await;
                self.dispatch(&update).await;
            }
        }
    }

    pub async fn dispatch(&self, update: &TelegramUpdate) {
        match self.route(update) {
            Route::Repost(message) => self.handle_repost(&message).await,
            Route::Start {
                chat_id,
                archived_id,
            } => self.handle_start(chat_id, archived_id).await,
            Route::Ignore => {}
        }
    }

    async fn handle_repost(&self, message: &InboundMessage) {
        match self.handler.handle_new_message(message).await {
            Ok(RepostOutcome::Posted { .. }) | Ok(RepostOutcome::NoMedia) => {}
            Ok(RepostOutcome::NotArchived) => {
                debug!(
                    "Post {} in chat {} was not archived",
                    message.message_id, message.chat_id
                );
            }
            Ok(RepostOutcome::Discarded { archived_id }) => {
                info!(
                    "Post {} in chat {} archived as {} but not reposted: no repost channel",
                    message.message_id, message.chat_id, archived_id
                );
            }
            Err(e) => {
                warn!(
                    "Error processing message {} in chat {}: {}",
                    message.message_id, message.chat_id, e
                );
            }
        }
    }

    async fn handle_start(&self, chat_id: i64, archived_id: Option<i64>) {
        let result = match archived_id {
            Some(archived_id) => self.deliver_archived(chat_id, archived_id).await,
            None => self.client.send_plain_text(chat_id, WELCOME_TEXT).await,
        };
        if let Err(e) = result {
            warn!("Failed to answer /start in chat {}: {}", chat_id, e);
        }
    }

    async fn deliver_archived(&self, chat_id: i64, archived_id: i64) -> Result<()> {
        let known = self
            .storage
            .lock()
            .await
            .has_archived_copy(self.archive_chat_id, archived_id)?;
        if !known {
            info!("Unknown archived id {} requested by chat {}", archived_id, chat_id);
            return self.client.send_plain_text(chat_id, MISSING_FILE_TEXT).await;
        }

        self.client
            .copy_message(chat_id, self.archive_chat_id, archived_id)
            .await?;
        info!("Delivered archived message {} to chat {}", archived_id, chat_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediashare_core::{MediaArchiver, RepostSettings};

    fn config(monitored: Option<Vec<i64>>) -> Config {
        let mut config: Config = toml::from_str(
            r#"
[telegram]
bot_token = "123456:TESTTOKEN"

[archive]
channel_id = -900
link_prefix = "share"
"#,
        )
        .expect("config");
        config.telegram.monitored_channels = monitored;
        config
    }

    fn make_dispatcher(config: &Config) -> Dispatcher {
        let client = Arc::new(
            TelegramClient::with_api_base("http://127.0.0.1:9", &config.telegram.bot_token)
                .expect("client"),
        );
        let storage = Arc::new(Mutex::new(Storage::in_memory().expect("storage")));
        let archiver: Arc<dyn MediaArchiver> = Arc::new(ChannelArchiver::new(
            client.clone(),
            storage.clone(),
            config.archive.channel_id,
        ));
        let handler = RepostHandler::new(
            archiver,
            client.clone(),
            RepostSettings::from_config(config, "ShareBot"),
        );
        Dispatcher::new(config, client, handler, storage)
    }

    fn update(json: &str) -> TelegramUpdate {
        serde_json::from_str(json).expect("update")
    }

    #[test]
    fn routes_monitored_channel_post_to_repost() {
        let dispatcher = make_dispatcher(&config(Some(vec![-100])));
        let route = dispatcher.route(&update(
            r#"{"update_id": 1, "channel_post": {"message_id": 9, "chat": {"id": -100, "type": "channel"},
                "document": {"file_id": "d", "file_name": "a.zip", "file_size": 10}}}"#,
        ));
        match route {
            Route::Repost(message) => {
                assert_eq!(message.chat_id, -100);
                assert_eq!(message.message_id, 9);
                assert!(message.has_media());
            }
            other => panic!("expected repost, got {:?}", other),
        }
    }

    #[test]
    fn ignores_unmonitored_and_archive_channel_posts() {
        let dispatcher = make_dispatcher(&config(Some(vec![-100])));
        let unmonitored = update(
            r#"{"update_id": 2, "channel_post": {"message_id": 9, "chat": {"id": -200, "type": "channel"}}}"#,
        );
        assert_eq!(dispatcher.route(&unmonitored), Route::Ignore);

        let open = make_dispatcher(&config(None));
        let archive_post = update(
            r#"{"update_id": 3, "channel_post": {"message_id": 9, "chat": {"id": -900, "type": "channel"}}}"#,
        );
        assert_eq!(open.route(&archive_post), Route::Ignore);

        let listed = make_dispatcher(&config(Some(vec![-100, -900])));
        assert_eq!(listed.route(&archive_post), Route::Ignore);
    }

    #[test]
    fn routes_private_start_with_payload() {
        let dispatcher = make_dispatcher(&config(None));
        let start = update(
            r#"{"update_id": 4, "message": {"message_id": 1, "chat": {"id": 42, "type": "private"},
                "text": "/start share_77"}}"#,
        );
        assert_eq!(
            dispatcher.route(&start),
            Route::Start {
                chat_id: 42,
                archived_id: Some(77)
            }
        );

        let bare = update(
            r#"{"update_id": 5, "message": {"message_id": 2, "chat": {"id": 42, "type": "private"},
                "text": "/start"}}"#,
        );
        assert_eq!(
            dispatcher.route(&bare),
            Route::Start {
                chat_id: 42,
                archived_id: None
            }
        );

        let foreign = update(
            r#"{"update_id": 6, "message": {"message_id": 3, "chat": {"id": 42, "type": "private"},
                "text": "/start other_77"}}"#,
        );
        assert_eq!(
            dispatcher.route(&foreign),
            Route::Start {
                chat_id: 42,
                archived_id: None
            }
        );
    }

    #[test]
    fn ignores_group_messages_and_other_commands() {
        let dispatcher = make_dispatcher(&config(None));
        let group = update(
            r#"{"update_id": 7, "message": {"message_id": 1, "chat": {"id": -5, "type": "group"},
                "text": "/start share_1"}}"#,
        );
        assert_eq!(dispatcher.route(&group), Route::Ignore);

        let help = update(
            r#"{"update_id": 8, "message": {"message_id": 1, "chat": {"id": 42, "type": "private"},
                "text": "/starter"}}"#,
        );
        assert_eq!(dispatcher.route(&help), Route::Ignore);
    }

    #[tokio::test]
    async fn offset_round_trips_through_storage() {
        let dispatcher = make_dispatcher(&config(None));
        assert_eq!(dispatcher.read_offset().await, None);
        dispatcher.write_offset(101).await;
        assert_eq!(dispatcher.read_offset().await, Some(101));
    }
}
