use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::normalize::parse_count;

pub const DEFAULT_TWEETS_PATH: &str = "tweets.csv";
pub const DEFAULT_PROFILES_PATH: &str = "profiles.csv";

pub const TWEET_COLUMNS: [&str; 12] = [
    "tweet_url",
    "tweet_id",
    "user_handle",
    "profile_url",
    "content",
    "hashtags",
    "post_time",
    "scrape_time",
    "likes",
    "comments",
    "reposts",
    "views",
];

pub const PROFILE_COLUMNS: [&str; 18] = [
    "username_handle",
    "display_name",
    "user_id",
    "bio",
    "email",
    "phone",
    "address",
    "verification_status",
    "account_creation_date",
    "account_type",
    "protected_status",
    "followers_count",
    "following_count",
    "tweet_count",
    "media_count",
    "location",
    "website_url",
    "profile_language",
];

/// One collected post. `tweet_id` is either the permalink id or a synthetic
/// token; synthetic ids are not stable across runs.
///
/// `hashtags` is stored as one `;`-joined cell, so a token that itself
/// contains `;` (`#a;b`) reads back as two tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub tweet_url: Option<String>,
    pub tweet_id: String,
    pub user_handle: Option<String>,
    pub profile_url: Option<String>,
    pub content: Option<String>,
    pub hashtags: Vec<String>,
    pub post_time: Option<String>,
    pub scrape_time: String,
    pub likes: Option<u64>,
    pub comments: Option<u64>,
    pub reposts: Option<u64>,
}

/// Row shape of the tweet table. Field order is the column order.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TweetRow {
    tweet_url: Option<String>,
    tweet_id: String,
    user_handle: Option<String>,
    profile_url: Option<String>,
    content: Option<String>,
    hashtags: Option<String>,
    post_time: Option<String>,
    scrape_time: Option<String>,
    #[serde(deserialize_with = "lenient_count")]
    likes: Option<u64>,
    #[serde(deserialize_with = "lenient_count")]
    comments: Option<u64>,
    #[serde(deserialize_with = "lenient_count")]
    reposts: Option<u64>,
    /// Reserved, never filled. Whatever is there on read is ignored.
    views: Option<String>,
}

/// Stat cell read back from a table: "12", "12.0" (float-typed column),
/// "1.2K". Anything else is an absent count, not a bad row.
fn stored_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<u64>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map(|n| n as u64)
        })
        .or_else(|| parse_count(Some(raw)))
}

fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.as_deref().and_then(stored_count))
}

impl From<&PostRecord> for TweetRow {
    fn from(r: &PostRecord) -> Self {
        TweetRow {
            tweet_url: r.tweet_url.clone(),
            tweet_id: r.tweet_id.clone(),
            user_handle: r.user_handle.clone(),
            profile_url: r.profile_url.clone(),
            content: r.content.clone(),
            hashtags: Some(r.hashtags.join(";")).filter(|h| !h.is_empty()),
            post_time: r.post_time.clone(),
            scrape_time: Some(r.scrape_time.clone()),
            likes: r.likes,
            comments: r.comments,
            reposts: r.reposts,
            views: None,
        }
    }
}

impl From<TweetRow> for PostRecord {
    fn from(row: TweetRow) -> Self {
        PostRecord {
            tweet_url: row.tweet_url,
            tweet_id: row.tweet_id,
            user_handle: row.user_handle,
            profile_url: row.profile_url,
            content: row.content,
            hashtags: row
                .hashtags
                .map(|h| {
                    h.split(';')
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            post_time: row.post_time,
            scrape_time: row.scrape_time.unwrap_or_default(),
            likes: row.likes,
            comments: row.comments,
            reposts: row.reposts,
        }
    }
}

/// Overwrite `path` with the collected posts in the fixed column order.
pub fn save_posts(path: &Path, posts: &[PostRecord]) -> Result<()> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    w.write_record(TWEET_COLUMNS)?;
    for post in posts {
        w.serialize(TweetRow::from(post))?;
    }
    w.flush()?;
    Ok(())
}

/// Read a tweet table back in row order. Missing columns read as empty,
/// unknown columns are ignored.
pub fn load_posts(path: &Path) -> Result<Vec<PostRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut posts = Vec::new();
    for (i, row) in rdr.deserialize::<TweetRow>().enumerate() {
        let row = row.with_context(|| format!("Bad row {} in {}", i + 1, path.display()))?;
        posts.push(PostRecord::from(row));
    }
    Ok(posts)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerificationStatus {
    Verified,
    Unverified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccountType {
    #[serde(rename = "Business/Professional")]
    BusinessProfessional,
    #[serde(rename = "Personal/Unknown")]
    PersonalUnknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProtectedStatus {
    Private,
    Public,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VerificationStatus::Verified => "Verified",
            VerificationStatus::Unverified => "Unverified",
        })
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccountType::BusinessProfessional => "Business/Professional",
            AccountType::PersonalUnknown => "Personal/Unknown",
        })
    }
}

impl fmt::Display for ProtectedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProtectedStatus::Private => "Private",
            ProtectedStatus::Public => "Public",
        })
    }
}

/// Profile page snapshot. Everything but the handle is best-effort; contact
/// fields are regex guesses over the bio and may be wrong.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileRecord {
    pub username_handle: String,
    pub display_name: Option<String>,
    pub user_id: Option<String>,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub verification_status: VerificationStatus,
    pub account_creation_date: Option<String>,
    pub account_type: AccountType,
    pub protected_status: ProtectedStatus,
    pub followers_count: Option<u64>,
    pub following_count: Option<u64>,
    pub tweet_count: Option<u64>,
    pub media_count: Option<u64>,
    pub location: Option<String>,
    pub website_url: Option<String>,
    pub profile_language: Option<String>,
    #[serde(skip)]
    pub profile_image_url: Option<String>,
    #[serde(skip)]
    pub banner_image_url: Option<String>,
}

impl ProfileRecord {
    /// Field name / display value pairs, table columns first.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let num = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_default();
        vec![
            ("username_handle", self.username_handle.clone()),
            ("display_name", opt(&self.display_name)),
            ("user_id", opt(&self.user_id)),
            ("bio", opt(&self.bio)),
            ("email", opt(&self.email)),
            ("phone", opt(&self.phone)),
            ("address", opt(&self.address)),
            ("verification_status", self.verification_status.to_string()),
            ("account_creation_date", opt(&self.account_creation_date)),
            ("account_type", self.account_type.to_string()),
            ("protected_status", self.protected_status.to_string()),
            ("followers_count", num(self.followers_count)),
            ("following_count", num(self.following_count)),
            ("tweet_count", num(self.tweet_count)),
            ("media_count", num(self.media_count)),
            ("location", opt(&self.location)),
            ("website_url", opt(&self.website_url)),
            ("profile_language", opt(&self.profile_language)),
            ("profile_image_url", opt(&self.profile_image_url)),
            ("banner_image_url", opt(&self.banner_image_url)),
        ]
    }
}

/// Append one profile row, writing the header first when the file is new.
pub fn append_profile(path: &Path, profile: &ProfileRecord) -> Result<()> {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if size == 0 {
        w.write_record(PROFILE_COLUMNS)?;
    }
    w.serialize(profile)?;
    w.flush()?;
    Ok(())
}
