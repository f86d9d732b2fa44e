//! Deep links into the bot's `/start` command

/// `https://t.me/<bot>?start=<prefix>_<id>`
pub fn share_link(bot_username: &str, prefix: &str, archived_id: i64) -> String {
    format!(
        "https://t.me/{}?start={}",
        bot_username.trim_start_matches('@'),
        start_payload(prefix, archived_id)
    )
}

pub fn start_payload(prefix: &str, archived_id: i64) -> String {
    format!("{}_{}", prefix, archived_id)
}

/// Recovers the archived id from a `/start` payload built by [`start_payload`].
pub fn parse_start_payload(payload: &str, prefix: &str) -> Option<i64> {
    let id = payload.trim().strip_prefix(prefix)?.strip_prefix('_')?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}
