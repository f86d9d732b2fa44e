//! Mediashare Configuration
//!
//! TOML configuration loading with environment variable overrides

use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_LINK_PREFIX: &str = "PredatorHackerzZ";

/// `start` payloads are capped at 64 characters; the prefix shares them with
/// `_` and a message id of up to 19 digits.
pub const MAX_LINK_PREFIX_LEN: usize = 44;

pub const ENV_BOT_TOKEN: &str = "MEDIASHARE_BOT_TOKEN";
pub const ENV_BOT_USERNAME: &str = "MEDIASHARE_BOT_USERNAME";
pub const ENV_REPOST_CHANNEL: &str = "MEDIASHARE_REPOST_CHANNEL";
pub const ENV_ARCHIVE_CHANNEL: &str = "MEDIASHARE_ARCHIVE_CHANNEL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub repost: RepostConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    pub data_dir: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Username without the leading `@`. Resolved through `getMe` when unset.
    #[serde(default)]
    pub bot_username: Option<String>,
    pub poll_timeout_secs: Option<u64>,
    pub client_recreate_interval_secs: Option<u64>,
    /// Channels whose new posts get reposted. `None` accepts every channel
    /// the bot can see.
    #[serde(default)]
    pub monitored_channels: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub channel_id: i64,
    #[serde(default = "default_link_prefix")]
    pub link_prefix: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            channel_id: 0,
            link_prefix: default_link_prefix(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnroutedPolicy {
    /// Drop the formatted post silently when no destination is configured.
    #[default]
    Discard,
    /// Report a missing destination as a processing error.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RepostConfig {
    #[serde(default)]
    pub channel_id: Option<i64>,
    #[serde(default)]
    pub unrouted: UnroutedPolicy,
}

fn default_link_prefix() -> String {
    DEFAULT_LINK_PREFIX.to_string()
}

impl TelegramConfig {
    /// Numeric bot id, the part of the token before the colon.
    pub fn account_tag(&self) -> &str {
        self.bot_token
            .split(':')
            .next()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .unwrap_or("default")
    }

    pub fn is_monitored(&self, chat_id: i64) -> bool {
        self.monitored_channels
            .as_ref()
            .is_none_or(|channels| channels.contains(&chat_id))
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mediashare").join("config.toml"))
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(token) = lookup(ENV_BOT_TOKEN) {
            self.telegram.bot_token = token;
        }
        if let Some(username) = lookup(ENV_BOT_USERNAME) {
            self.telegram.bot_username = Some(username);
        }
        if let Some(raw) = lookup(ENV_REPOST_CHANNEL) {
            let channel = raw.parse::<i64>().map_err(|e| {
                anyhow::anyhow!("{} must be a numeric chat id ('{}'): {}", ENV_REPOST_CHANNEL, raw, e)
            })?;
            self.repost.channel_id = Some(channel);
        }
        if let Some(raw) = lookup(ENV_ARCHIVE_CHANNEL) {
            self.archive.channel_id = raw.parse::<i64>().map_err(|e| {
                anyhow::anyhow!("{} must be a numeric chat id ('{}'): {}", ENV_ARCHIVE_CHANNEL, raw, e)
            })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let token = self.telegram.bot_token.trim();
        if token.is_empty() {
            anyhow::bail!("telegram.bot_token cannot be empty");
        }
        if !token.contains(':') {
            anyhow::bail!("telegram.bot_token has invalid format (expected '<id>:<secret>')");
        }

        if let Some(username) = &self.telegram.bot_username {
            let username = username.trim();
            if username.is_empty() {
                anyhow::bail!("telegram.bot_username cannot be empty when set");
            }
            if username.starts_with('@') {
                anyhow::bail!("telegram.bot_username must not start with '@'");
            }
        }

        if let Some(timeout) = self.telegram.poll_timeout_secs {
            if timeout == 0 {
                anyhow::bail!("telegram.poll_timeout_secs must be > 0");
            }
        }

        if let Some(channels) = &self.telegram.monitored_channels {
            if channels.is_empty() {
                anyhow::bail!(
                    "telegram.monitored_channels is empty; remove it to monitor every channel"
                );
            }
        }

        if self.archive.channel_id == 0 {
            anyhow::bail!("archive.channel_id must be set");
        }

        let prefix = self.archive.link_prefix.trim();
        if prefix.is_empty() {
            anyhow::bail!("archive.link_prefix cannot be empty");
        }
        if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            anyhow::bail!(
                "archive.link_prefix '{}' may only contain A-Z, a-z, 0-9, '_' and '-'",
                prefix
            );
        }
        if prefix.len() > MAX_LINK_PREFIX_LEN {
            anyhow::bail!(
                "archive.link_prefix is longer than {} characters",
                MAX_LINK_PREFIX_LEN
            );
        }

        if self.repost.channel_id == Some(self.archive.channel_id) {
            anyhow::bail!("repost.channel_id cannot be the archive channel");
        }

        Ok(())
    }

    pub fn template() -> String {
        format!(
            r#"[core]
# data_dir = "~/.mediashare"
log_level = "info"

[telegram]
bot_token = ""
# bot_username = "MyShareBot"
poll_timeout_secs = 60
client_recreate_interval_secs = 60
# monitored_channels = [-1001234567890]

[archive]
channel_id = 0
link_prefix = "{}"

[repost]
# channel_id = -1009876543210
unrouted = "discard"
"#,
            DEFAULT_LINK_PREFIX
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, UnroutedPolicy, DEFAULT_LINK_PREFIX, MAX_LINK_PREFIX_LEN};
    use std::collections::HashMap;

    fn parse_config(input: &str) -> Config {
        let cfg: Config = toml::from_str(input).expect("valid TOML");
        cfg
    }

    fn minimal() -> Config {
        parse_config(
            r#"
[telegram]
bot_token = "123:abc"

[archive]
channel_id = -1001
"#,
        )
    }

    #[test]
    fn validate_accepts_minimal_config_with_defaults() {
        let cfg = minimal();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.archive.link_prefix, DEFAULT_LINK_PREFIX);
        assert_eq!(cfg.repost.channel_id, None);
        assert_eq!(cfg.repost.unrouted, UnroutedPolicy::Discard);
        assert!(cfg.telegram.is_monitored(-42));
    }

    #[test]
    fn validate_rejects_empty_token() {
        let mut cfg = minimal();
        cfg.telegram.bot_token = "  ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_link_prefix() {
        let mut cfg = minimal();
        cfg.archive.link_prefix = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_link_prefix_outside_start_charset() {
        let mut cfg = minimal();
        for bad in ["my.share", "share link", "ссылка", "a+b"] {
            cfg.archive.link_prefix = bad.to_string();
            let err = cfg.validate().expect_err("prefix must be rejected");
            assert!(err.to_string().contains("archive.link_prefix"), "{}", bad);
        }

        cfg.archive.link_prefix = "my-share_2".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_caps_link_prefix_length() {
        let mut cfg = minimal();
        cfg.archive.link_prefix = "a".repeat(MAX_LINK_PREFIX_LEN);
        assert!(cfg.validate().is_ok());
        cfg.archive.link_prefix = "a".repeat(MAX_LINK_PREFIX_LEN + 1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_missing_archive_channel() {
        let cfg = parse_config(
            r#"
[telegram]
bot_token = "123:abc"
"#,
        );
        let err = cfg.validate().expect_err("archive channel is required");
        assert!(err.to_string().contains("archive.channel_id"));
    }

    #[test]
    fn validate_rejects_at_prefixed_username() {
        let mut cfg = minimal();
        cfg.telegram.bot_username = Some("@ShareBot".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_unrouted_error_policy_and_monitored_channels() {
        let cfg = parse_config(
            r#"
[telegram]
bot_token = "123:abc"
monitored_channels = [-100, -200]

[archive]
channel_id = -1001

[repost]
channel_id = -2002
unrouted = "error"
"#,
        );
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.repost.unrouted, UnroutedPolicy::Error);
        assert_eq!(cfg.repost.channel_id, Some(-2002));
        assert!(cfg.telegram.is_monitored(-200));
        assert!(!cfg.telegram.is_monitored(-300));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut cfg = minimal();
        let env: HashMap<&str, &str> = HashMap::from([
            ("MEDIASHARE_BOT_TOKEN", "999:zzz"),
            ("MEDIASHARE_BOT_USERNAME", "ShareBot"),
            ("MEDIASHARE_REPOST_CHANNEL", "-3003"),
            ("MEDIASHARE_ARCHIVE_CHANNEL", " -4004 "),
        ]);
        cfg.apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .expect("overrides");

        assert_eq!(cfg.telegram.bot_token, "999:zzz");
        assert_eq!(cfg.telegram.account_tag(), "999");
        assert_eq!(cfg.telegram.bot_username.as_deref(), Some("ShareBot"));
        assert_eq!(cfg.repost.channel_id, Some(-3003));
        assert_eq!(cfg.archive.channel_id, -4004);
    }

    #[test]
    fn overrides_reject_non_numeric_channel() {
        let mut cfg = minimal();
        let result = cfg.apply_overrides(|key| {
            (key == "MEDIASHARE_REPOST_CHANNEL").then(|| "@channel".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn template_parses_back() {
        let cfg = parse_config(&Config::template());
        assert_eq!(cfg.archive.link_prefix, DEFAULT_LINK_PREFIX);
        assert_eq!(cfg.telegram.poll_timeout_secs, Some(60));
    }
}
