use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{first_match, Probe};
use crate::browser::{DomResult, Element};
use crate::normalize::{count_in, current_timestamp, extract_pattern, new_synthetic_id};
use crate::store::PostRecord;

/// One post card in a results feed.
pub const CARD: &str = r#"//article[@data-testid="tweet"]"#;

const PERMALINK: &str = r#".//a[contains(@href,"/status/")][.//time]"#;
const ANY_STATUS_LINK: &str = r#".//a[contains(@href,"/status/")]"#;
const PERMALINK_TIME: &str = r#".//a[contains(@href,"/status/")]//time"#;
const ANY_TIME: &str = ".//time";
const AUTHOR_LINK: &str = r#".//div[@data-testid="User-Name"]//a"#;
const TWEET_TEXT: &str = r#".//div[@data-testid="tweetText"]"#;

static STATUS_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"status/(\d+)").unwrap());

fn stat_button(testid: &str) -> String {
    format!(r#".//button[@data-testid="{}"]"#, testid)
}

/// Visible count first, accessible label when the count is hidden. The second
/// test-id covers the toggled state (already liked / reposted).
fn stat_probes(testids: &[&str]) -> Vec<Probe> {
    testids
        .iter()
        .flat_map(|id| {
            let button = stat_button(id);
            [Probe::text(&button), Probe::attr(&button, "aria-label")]
        })
        .collect()
}

struct CardProbes {
    permalink: Vec<Probe>,
    post_time: Vec<Probe>,
    author: Vec<Probe>,
    content: Vec<Probe>,
    comments: Vec<Probe>,
    reposts: Vec<Probe>,
    likes: Vec<Probe>,
}

static PROBES: LazyLock<CardProbes> = LazyLock::new(|| CardProbes {
    permalink: vec![
        Probe::attr(PERMALINK, "href"),
        Probe::attr(ANY_STATUS_LINK, "href"),
    ],
    // Machine-readable attribute only; the visible text is relative ("3h").
    post_time: vec![
        Probe::attr(PERMALINK_TIME, "datetime"),
        Probe::attr(ANY_TIME, "datetime"),
    ],
    author: vec![Probe::attr(AUTHOR_LINK, "href")],
    content: vec![Probe::text(TWEET_TEXT)],
    comments: stat_probes(&["reply"]),
    reposts: stat_probes(&["retweet", "unretweet"]),
    likes: stat_probes(&["like", "unlike"]),
});

/// Build a record from one card. Every field group is read on its own, so a
/// missing permalink, author, text or stat only blanks that group. The only
/// error is a card that went stale mid-read, which the caller skips.
pub async fn extract_card<E: Element>(card: &E) -> DomResult<PostRecord> {
    let p = &*PROBES;
    let scrape_time = current_timestamp();

    let tweet_url = first_match(card, &p.permalink).await?;
    let tweet_id = match extract_pattern(&STATUS_ID, tweet_url.as_deref()) {
        Some(id) => id,
        None => {
            let id = new_synthetic_id();
            debug!("No permalink id on card, using synthetic id {}", id);
            id
        }
    };
    let post_time = first_match(card, &p.post_time).await?;

    let profile_url = first_match(card, &p.author).await?;
    let user_handle = profile_url.as_deref().and_then(handle_from_profile_url);

    let content = first_match(card, &p.content).await?;
    let hashtags = content.as_deref().map(hashtags_in).unwrap_or_default();

    let comments = count_in(first_match(card, &p.comments).await?.as_deref());
    let reposts = count_in(first_match(card, &p.reposts).await?.as_deref());
    let likes = count_in(first_match(card, &p.likes).await?.as_deref());

    Ok(PostRecord {
        tweet_url,
        tweet_id,
        user_handle,
        profile_url,
        content,
        hashtags,
        post_time,
        scrape_time,
        likes,
        comments,
        reposts,
    })
}

/// Last path segment of a profile link. Links of the generic `/i/user/<id>`
/// form carry no handle.
pub fn handle_from_profile_url(url: &str) -> Option<String> {
    if url.contains("user/") {
        return None;
    }
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|s| s.trim_start_matches('@'))
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .map(str::to_string)
}

/// Whitespace-delimited tokens starting with '#', in order, repeats kept.
pub fn hashtags_in(content: &str) -> Vec<String> {
    content
        .split_whitespace()
        .filter(|w| w.starts_with('#'))
        .map(str::to_string)
        .collect()
}
