use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::store::PostRecord;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OriginatorError {
    #[error("none of the {0} collected posts has a parseable post_time")]
    NoValidTimestamps(usize),
}

/// Reduced view of the earliest post.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginatorCandidate {
    pub user_handle: Option<String>,
    pub profile_url: Option<String>,
    pub tweet_id: String,
    pub tweet_url: Option<String>,
    pub post_time: String,
}

impl fmt::Display for OriginatorCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
        write!(
            f,
            "@{} ({}) tweet {} at {} [{}]",
            or_dash(&self.user_handle),
            or_dash(&self.profile_url),
            self.tweet_id,
            self.post_time,
            or_dash(&self.tweet_url),
        )
    }
}

/// Lenient timestamp parsing: RFC 3339 first, then a few common shapes.
/// Naive values are taken as UTC.
pub fn parse_post_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Pick the post with the earliest parseable `post_time`. Equal times resolve
/// to the earlier row. Zero parseable rows is an error, never a default.
pub fn find_originator(posts: &[PostRecord]) -> Result<OriginatorCandidate, OriginatorError> {
    let earliest = posts
        .iter()
        .filter_map(|p| {
            let raw = p.post_time.as_deref()?;
            match parse_post_time(raw) {
                Some(t) => Some((t, p, raw)),
                None => {
                    debug!("Unparseable post_time {:?} on {}", raw, p.tweet_id);
                    None
                }
            }
        })
        .min_by_key(|(t, _, _)| *t);

    let (_, post, raw) = earliest.ok_or(OriginatorError::NoValidTimestamps(posts.len()))?;
    Ok(OriginatorCandidate {
        user_handle: post.user_handle.clone(),
        profile_url: post.profile_url.clone(),
        tweet_id: post.tweet_id.clone(),
        tweet_url: post.tweet_url.clone(),
        post_time: raw.to_string(),
    })
}
