//! Bot API HTTP client

use crate::types::{TelegramMessageId, TelegramUpdate, TelegramUser};
use anyhow::{anyhow, bail, Result};
use mediashare_core::post::{
    strip_html, visible_len, MAX_CAPTION_CHARS, MAX_MESSAGE_CHARS, POST_PARSE_MODE,
};
use mediashare_core::{MessagingClient, UrlButton};
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramClient {
    client: Client,
    api_url: String,
}

impl TelegramClient {
    pub fn new(bot_token: &str) -> Result<Self> {
        Self::with_api_base(TELEGRAM_API_BASE, bot_token)
    }

    pub fn with_api_base(api_base: &str, bot_token: &str) -> Result<Self> {
        Ok(Self {
            client: Self::build_http_client()?,
            api_url: format!("{}/bot{}", api_base.trim_end_matches('/'), bot_token),
        })
    }

    pub fn build_http_client() -> Result<Client> {
        ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(600))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .timeout(Duration::from_secs(180))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow!("failed to build HTTP client: {}", e))
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_url, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        client: &Client,
        method: &str,
        payload: &serde_json::Value,
    ) -> Result<T> {
        let resp = client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|e| anyhow!("telegram {} request failed: {}", method, e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| anyhow!("telegram {} read failed: {}", method, e))?;

        let parsed: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                return Err(anyhow!("telegram {} decode failed: {}", method, e));
            }
            Err(_) => return Err(anyhow!("telegram {} HTTP {}: {}", method, status, body)),
        };

        if !parsed.ok {
            return Err(anyhow!(
                "telegram {} HTTP {}: {}",
                method,
                status,
                parsed
                    .description
                    .unwrap_or_else(|| "returned ok=false".to_string())
            ));
        }

        parsed
            .result
            .ok_or_else(|| anyhow!("telegram {} returned no result", method))
    }

    /// Sends a formatted payload; if Telegram cannot parse the markup, sends
    /// it once more with the markup stripped.
    async fn send_with_parse_mode_fallback(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let err = match self.call(&self.client, method, &payload).await {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };

        if !is_entity_parse_error(&err.to_string()) {
            return Err(err);
        }
        warn!(
            "telegram {} rejected {} markup, retrying as plain text: {}",
            method, POST_PARSE_MODE, err
        );

        let fallback_payload = plain_text_payload(payload);
        self.call(&self.client, method, &fallback_payload)
            .await
            .map_err(|e| anyhow!("{} (plain-text fallback)", e))
    }

    pub async fn get_updates(
        &self,
        client: &Client,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<TelegramUpdate>> {
        let mut payload = serde_json::json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "channel_post"],
        });

        if let Some(offset) = offset {
            payload["offset"] = serde_json::json!(offset);
        }

        self.call(client, "getUpdates", &payload).await
    }

    pub async fn get_me(&self) -> Result<TelegramUser> {
        self.call(&self.client, "getMe", &serde_json::json!({}))
            .await
    }

    /// Copies a message without the "forwarded from" header. Returns the new
    /// message id in `chat_id`.
    pub async fn copy_message(
        &self,
        chat_id: i64,
        from_chat_id: i64,
        message_id: i64,
    ) -> Result<i64> {
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "from_chat_id": from_chat_id,
            "message_id": message_id,
        });
        let copied: TelegramMessageId = self.call(&self.client, "copyMessage", &payload).await?;
        Ok(copied.message_id)
    }

    pub async fn send_plain_text(&self, chat_id: i64, text: &str) -> Result<()> {
        for chunk in chunk_message(text) {
            let payload = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            let _: serde_json::Value = self.call(&self.client, "sendMessage", &payload).await?;
        }
        Ok(())
    }

    async fn send_post_text(
        &self,
        chat_id: i64,
        text: &str,
        button: &UrlButton,
        disable_preview: bool,
    ) -> Result<()> {
        let len = visible_len(text);
        if len > MAX_MESSAGE_CHARS {
            bail!("post text is {} characters, over the {} limit", len, MAX_MESSAGE_CHARS);
        }

        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": POST_PARSE_MODE,
            "disable_web_page_preview": disable_preview,
            "reply_markup": url_keyboard(button),
        });

        self.send_with_parse_mode_fallback("sendMessage", payload)
            .await
            .map(|_| ())
    }
}

#[async_trait::async_trait]
impl MessagingClient for TelegramClient {
    async fn send_photo(
        &self,
        chat_id: i64,
        photo: &str,
        caption: &str,
        button: &UrlButton,
    ) -> Result<()> {
        let len = visible_len(caption);
        if len > MAX_CAPTION_CHARS {
            bail!("caption is {} characters, over the {} limit", len, MAX_CAPTION_CHARS);
        }

        let payload = serde_json::json!({
            "chat_id": chat_id,
            "photo": photo,
            "caption": caption,
            "parse_mode": POST_PARSE_MODE,
            "reply_markup": url_keyboard(button),
        });

        self.send_with_parse_mode_fallback("sendPhoto", payload)
            .await
            .map(|_| ())
    }

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        button: &UrlButton,
        disable_preview: bool,
    ) -> Result<()> {
        self.send_post_text(chat_id, text, button, disable_preview)
            .await
    }
}

fn url_keyboard(button: &UrlButton) -> serde_json::Value {
    serde_json::json!({
        "inline_keyboard": [[{
            "text": button.text,
            "url": button.url,
        }]]
    })
}

/// Drops `parse_mode` and replaces the marked-up text with its plain rendering.
fn plain_text_payload(mut payload: serde_json::Value) -> serde_json::Value {
    if let Some(obj) = payload.as_object_mut() {
        obj.remove("parse_mode");
        for key in ["text", "caption"] {
            if let Some(serde_json::Value::String(marked_up)) = obj.get(key) {
                let plain = strip_html(marked_up);
                obj.insert(key.to_string(), serde_json::Value::String(plain));
            }
        }
    }
    payload
}

fn is_entity_parse_error(message: &str) -> bool {
    message.to_ascii_lowercase().contains("can't parse entities")
}

fn chunk_message(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= MAX_MESSAGE_CHARS {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let mut end = (start + MAX_MESSAGE_CHARS).min(chars.len());

        if end < chars.len() {
            if let Some(split) = (start..end).rev().find(|&i| chars[i] == '\n' || chars[i] == ' ')
            {
                end = split + 1;
            }
        }

        chunks.push(chars[start..end].iter().collect::<String>());
        start = end;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_message_keeps_short_text_whole() {
        assert_eq!(chunk_message("hello"), vec!["hello".to_string()]);
    }

    #[test]
    fn chunk_message_preserves_content_for_unicode_text() {
        let text = format!("{} {}", "📥".repeat(5000), "fine");
        let chunks = chunk_message(&text);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn chunk_message_respects_telegram_limit_by_characters() {
        let text = "abc 📝\n".repeat(1500);
        let chunks = chunk_message(&text);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 4096));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn url_keyboard_has_single_url_button() {
        let keyboard = url_keyboard(&UrlButton {
            text: "📥 Download Now".to_string(),
            url: "https://t.me/ShareBot?start=p_1".to_string(),
        });
        let rows = keyboard["inline_keyboard"].as_array().expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0]["url"], "https://t.me/ShareBot?start=p_1");
        assert!(rows[0][0].get("callback_data").is_none());
    }

    #[test]
    fn api_error_response_decodes_without_result() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        let parsed: ApiResponse<serde_json::Value> = serde_json::from_str(body).expect("decode");
        assert!(!parsed.ok);
        assert!(parsed.result.is_none());
        assert_eq!(
            parsed.description.as_deref(),
            Some("Bad Request: chat not found")
        );
    }

    #[test]
    fn detect_entity_parse_error() {
        let description = "telegram sendMessage HTTP 400 Bad Request: Bad Request: can't parse entities: Unsupported start tag \"x\" at byte offset 12";
        assert!(is_entity_parse_error(description));
        assert!(!is_entity_parse_error("telegram sendMessage HTTP 403 Forbidden: bot was kicked"));
    }

    #[test]
    fn plain_text_retry_drops_markup_but_keeps_button() {
        let payload = serde_json::json!({
            "chat_id": -200,
            "caption": "📝 <b>Title:</b> Tom &amp; Jerry &lt;3",
            "parse_mode": POST_PARSE_MODE,
            "reply_markup": url_keyboard(&UrlButton {
                text: "📥 Download Now".to_string(),
                url: "https://t.me/ShareBot?start=p_1".to_string(),
            }),
        });

        let plain = plain_text_payload(payload);

        assert!(plain.get("parse_mode").is_none());
        assert_eq!(plain["caption"], "📝 Title: Tom & Jerry <3");
        assert_eq!(
            plain["reply_markup"]["inline_keyboard"][0][0]["url"],
            "https://t.me/ShareBot?start=p_1"
        );
    }

    #[test]
    fn escaped_caption_within_limit_is_measured_unescaped() {
        let caption = format!("<b>Title:</b> {}", "&amp;".repeat(1000));
        assert!(caption.chars().count() > MAX_CAPTION_CHARS);
        assert_eq!(visible_len(&caption), 1007);
    }

    #[test]
    fn api_url_strips_trailing_slash() {
        let client = TelegramClient::with_api_base("http://localhost:8081/", "1:abc").expect("client");
        assert_eq!(client.method_url("getMe"), "http://localhost:8081/bot1:abc/getMe");
    }
}
