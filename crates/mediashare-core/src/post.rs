//! Repost caption formatting

use crate::media::Metadata;
use serde::Serialize;

/// Telegram `parse_mode` matching the markup produced by [`format_post`].
pub const POST_PARSE_MODE: &str = "HTML";

pub const DOWNLOAD_BUTTON_LABEL: &str = "📥 Download Now";

/// Telegram limits, counted on the rendered text after entity parsing.
pub const MAX_CAPTION_CHARS: usize = 1024;
pub const MAX_MESSAGE_CHARS: usize = 4096;

const ELLIPSIS: char = '…';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlButton {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedPost {
    pub text: String,
    pub button: UrlButton,
}

/// `M:SS`, minutes unbounded.
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

pub fn duration_line(seconds: u64) -> String {
    format!("⏱ Duration: {}", format_duration(seconds))
}

/// Photo posts carry the text as a caption, which has the tighter limit.
pub fn max_post_chars(metadata: &Metadata) -> usize {
    if metadata.thumbnail.is_some() {
        MAX_CAPTION_CHARS
    } else {
        MAX_MESSAGE_CHARS
    }
}

pub fn format_post(share_link: &str, metadata: &Metadata, bot_username: &str) -> FormattedPost {
    format_post_with_limit(share_link, metadata, bot_username, MAX_MESSAGE_CHARS)
}

/// Like [`format_post`], but shortens the title with an ellipsis so the
/// rendered text stays within `max_chars`. A post is always one message.
pub fn format_post_with_limit(
    share_link: &str,
    metadata: &Metadata,
    bot_username: &str,
    max_chars: usize,
) -> FormattedPost {
    let text = render_post(&metadata.title, share_link, metadata, bot_username);
    let overflow = visible_len(&text).saturating_sub(max_chars);
    let text = if overflow == 0 {
        text
    } else {
        let title = shorten(&metadata.title, overflow);
        render_post(&title, share_link, metadata, bot_username)
    };

    FormattedPost {
        text,
        button: UrlButton {
            text: DOWNLOAD_BUTTON_LABEL.to_string(),
            url: share_link.to_string(),
        },
    }
}

fn render_post(title: &str, share_link: &str, metadata: &Metadata, bot_username: &str) -> String {
    let duration_text = metadata
        .duration
        .filter(|secs| *secs > 0)
        .map(|secs| format!("\n{}", duration_line(secs)))
        .unwrap_or_default();

    format!(
        "📝 <b>Title:</b> {}\n\
         💾 <b>Size:</b> {}{}\n\n\
         🔗 <b>Download Link:</b> {}\n\n\
         🤖 <b>Upload By @{}</b>",
        escape_html(title),
        escape_html(&metadata.file_size),
        duration_text,
        escape_html(share_link),
        escape_html(bot_username.trim_start_matches('@')),
    )
}

/// Drops `overflow` characters plus room for the ellipsis from the end.
fn shorten(title: &str, overflow: usize) -> String {
    let keep = title.chars().count().saturating_sub(overflow + 1);
    let mut out: String = title.chars().take(keep).collect();
    out.push(ELLIPSIS);
    out
}

/// Character count Telegram sees once the markup is parsed.
pub fn visible_len(html: &str) -> usize {
    strip_html(html).chars().count()
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Markup-free rendering of text produced by [`format_post`]: tags dropped,
/// entities decoded.
pub fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            _ => out.push(c),
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINK: &str = "https://t.me/ShareBot?start=PredatorHackerzZ_42";

    fn metadata(duration: Option<u64>) -> Metadata {
        Metadata {
            title: "clip.mp4".to_string(),
            file_size: "5.0 MB".to_string(),
            mime_type: "video/mp4".to_string(),
            duration,
            thumbnail: None,
        }
    }

    #[test]
    fn duration_renders_minutes_and_padded_seconds() {
        assert_eq!(format_duration(125), "2:05");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(3600), "60:00");
        assert_eq!(duration_line(125), "⏱ Duration: 2:05");
    }

    #[test]
    fn post_contains_link_username_and_duration() {
        let post = format_post(LINK, &metadata(Some(125)), "ShareBot");
        assert!(post.text.contains(LINK));
        assert!(post.text.contains("@ShareBot"));
        assert!(post.text.contains("💾 <b>Size:</b> 5.0 MB\n⏱ Duration: 2:05\n\n"));
        assert_eq!(post.button.url, LINK);
        assert_eq!(post.button.text, DOWNLOAD_BUTTON_LABEL);
    }

    #[test]
    fn post_omits_duration_when_absent() {
        let post = format_post(LINK, &metadata(None), "ShareBot");
        assert!(!post.text.contains("Duration"));
        assert_eq!(
            post.text,
            format!(
                "📝 <b>Title:</b> clip.mp4\n💾 <b>Size:</b> 5.0 MB\n\n🔗 <b>Download Link:</b> {}\n\n🤖 <b>Upload By @ShareBot</b>",
                LINK
            )
        );
    }

    #[test]
    fn zero_duration_is_treated_as_absent() {
        let post = format_post(LINK, &metadata(Some(0)), "ShareBot");
        assert!(!post.text.contains("Duration"));
    }

    #[test]
    fn title_markup_is_escaped() {
        let mut meta = metadata(None);
        meta.title = "<b>Tom & Jerry</b>".to_string();
        let post = format_post(LINK, &meta, "ShareBot");
        assert!(post.text.contains("&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;"));
    }

    #[test]
    fn strip_html_recovers_plain_text() {
        let mut meta = metadata(None);
        meta.title = "<b>Tom & Jerry</b> &lt;".to_string();
        let post = format_post(LINK, &meta, "ShareBot");
        let plain = strip_html(&post.text);
        assert!(plain.starts_with("📝 Title: <b>Tom & Jerry</b> &lt;\n"));
        assert!(plain.ends_with("🤖 Upload By @ShareBot"));
        assert!(!plain.contains("&amp;"));
    }

    #[test]
    fn short_post_is_not_shortened() {
        let post = format_post_with_limit(LINK, &metadata(Some(125)), "ShareBot", MAX_CAPTION_CHARS);
        assert_eq!(post, format_post(LINK, &metadata(Some(125)), "ShareBot"));
        assert!(!post.text.contains(ELLIPSIS));
    }

    #[test]
    fn escaped_title_is_measured_as_rendered_text() {
        let mut meta = metadata(Some(125));
        meta.title = "&".repeat(1000);

        let post = format_post_with_limit(LINK, &meta, "ShareBot", MAX_CAPTION_CHARS);

        assert_eq!(visible_len(&post.text), MAX_CAPTION_CHARS);
        assert!(post.text.len() > MAX_CAPTION_CHARS);
        let plain = strip_html(&post.text);
        let title_line = plain.lines().next().expect("title line");
        assert!(title_line.ends_with("&…"));
        // every ampersand in the markup is a whole entity
        assert_eq!(
            post.text.matches('&').count(),
            post.text.matches("&amp;").count()
        );
        assert!(plain.contains(LINK));
        assert!(plain.contains("⏱ Duration: 2:05"));
        assert_eq!(post.button.url, LINK);
    }

    #[test]
    fn thumbnail_selects_caption_limit() {
        let mut meta = metadata(None);
        assert_eq!(max_post_chars(&meta), MAX_MESSAGE_CHARS);
        meta.thumbnail = Some("thumb-1".to_string());
        assert_eq!(max_post_chars(&meta), MAX_CAPTION_CHARS);
    }

    #[test]
    fn long_title_fits_a_single_message() {
        let mut meta = metadata(None);
        meta.title = "x".repeat(5000);

        let post = format_post(LINK, &meta, "ShareBot");

        assert_eq!(visible_len(&post.text), MAX_MESSAGE_CHARS);
        assert!(post.text.contains(LINK));
    }
}
