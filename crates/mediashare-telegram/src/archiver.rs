//! Archive channel backed `MediaArchiver`

use crate::client::TelegramClient;
use anyhow::Result;
use mediashare_core::{ArchivedReference, InboundMessage, MediaArchiver};
use mediashare_storage::Storage;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Copies inbound media into a private archive channel and remembers the
/// mapping, so each source message is archived at most once.
pub struct ChannelArchiver {
    client: Arc<TelegramClient>,
    storage: Arc<Mutex<Storage>>,
    archive_chat_id: i64,
}

impl ChannelArchiver {
    pub fn new(
        client: Arc<TelegramClient>,
        storage: Arc<Mutex<Storage>>,
        archive_chat_id: i64,
    ) -> Self {
        Self {
            client,
            storage,
            archive_chat_id,
        }
    }

    fn is_eligible(&self, message: &InboundMessage) -> bool {
        message.has_media() && message.chat_id != self.archive_chat_id
    }
}

#[async_trait::async_trait]
impl MediaArchiver for ChannelArchiver {
    async fn save(&self, message: &InboundMessage) -> Result<Option<ArchivedReference>> {
        if !self.is_eligible(message) {
            debug!(
                chat_id = message.chat_id,
                message_id = message.message_id,
                "message not eligible for archiving"
            );
            return Ok(None);
        }

        if self
            .storage
            .lock()
            .await
            .is_archived(message.chat_id, message.message_id)?
        {
            debug!(
                chat_id = message.chat_id,
                message_id = message.message_id,
                "message already archived"
            );
            return Ok(None);
        }

        let archived_id = self
            .client
            .copy_message(self.archive_chat_id, message.chat_id, message.message_id)
            .await?;

        let recorded = self.storage.lock().await.record_archive(
            message.chat_id,
            message.message_id,
            self.archive_chat_id,
            archived_id,
        )?;
        if !recorded {
            // Another update for the same source won the race; keep its copy.
            warn!(
                chat_id = message.chat_id,
                message_id = message.message_id,
                archived_id,
                "duplicate archive copy created"
            );
            return Ok(None);
        }

        info!(
            chat_id = message.chat_id,
            message_id = message.message_id,
            archived_id,
            "media archived"
        );

        Ok(Some(ArchivedReference {
            chat_id: self.archive_chat_id,
            message_id: archived_id,
        }))
    }
}
