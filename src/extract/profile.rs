use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info};

use super::{best_effort, Probe};
use crate::browser::wait::Pacing;
use crate::browser::{Browser, DomResult, Element, Locator, Scope};
use crate::normalize::{count_in, extract_pattern};
use crate::store::{AccountType, ProfileRecord, ProtectedStatus, VerificationStatus};

const USER_NAME: &str = r#"//div[@data-testid="UserName"]"#;
const DISPLAY_NAME: &str = r#"//div[@data-testid="UserName"]//span[1]"#;
const BIO: &str = r#"//div[@data-testid="UserDescription"]"#;
const HEADER_ITEMS: &str = r#"//div[@data-testid="UserProfileHeader_Items"]//span"#;
const USER_URL: &str = r#"//a[@data-testid="UserUrl"]"#;
const STAT_LINKS: &str = r#"//div[@data-testid="UserStats"]//a"#;
const FOLLOW_LINKS: &str = r#"//a[contains(@href,"/followers") or contains(@href,"/following")]"#;
const VERIFIED_BADGES: &[&str] = &[
    r#"//div[@data-testid="UserName"]//*[contains(@aria-label,"Verified")]"#,
    r#"//div[@data-testid="UserName"]//*[@data-testid="icon-verified"]"#,
];
const PROTECTED_MARKERS: &[&str] = &[
    r#"//*[name()="svg" and @aria-label="Protected account"]"#,
    r#"//div[@data-testid="UserName"]//*[@data-testid="icon-lock"]"#,
];
const PRIVATE_PHRASES: &[&str] = &["This account is private", "These posts are protected"];
const PROFESSIONAL_CATEGORY: &str = r#"//div[@data-testid="UserProfessionalCategory"]"#;
const AVATAR_IMG: &str = r#"//div[starts-with(@data-testid,"UserAvatar-Container")]//img"#;
const AVATAR_SCRIPT: &str =
    r#"return document.querySelector('div[data-testid^="UserAvatar-Container"] img')?.src"#;
const BANNER_IMG: &str = r#"//img[@data-testid="profileHeaderPhoto"]"#;
const BANNER_DIV: &str = r#"//div[@data-testid="profileHeaderBanner"]"#;

static REST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""rest_id"\s*:\s*"(\d+)""#).unwrap());
static ID_STR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""id_str"\s*:\s*"(\d+)""#).unwrap());
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w.-]+@[\w.-]+\.\w+)").unwrap());
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\+?\d[\d\-\s]{7,}\d)").unwrap());

fn tab(name: &str) -> String {
    format!(r#"//a[@role="tab" and .//span[text()="{}"]]"#, name)
}

struct ProfileProbes {
    display_name: Vec<Probe>,
    bio: Vec<Probe>,
    website_link: Vec<Probe>,
    posts_tab: Vec<Probe>,
    media_tab: Vec<Probe>,
    professional: Vec<Probe>,
    language: Vec<Probe>,
    avatar: Vec<Probe>,
    banner: Vec<Probe>,
}

static PROBES: LazyLock<ProfileProbes> = LazyLock::new(|| ProfileProbes {
    display_name: vec![Probe::text(DISPLAY_NAME)],
    bio: vec![Probe::text(BIO)],
    website_link: vec![Probe::attr(USER_URL, "href"), Probe::text(USER_URL)],
    posts_tab: vec![Probe::label(&tab("Posts"))],
    media_tab: vec![Probe::label(&tab("Media"))],
    professional: vec![Probe::text(PROFESSIONAL_CATEGORY)],
    language: vec![Probe::attr("//html", "lang")],
    avatar: vec![Probe::attr(AVATAR_IMG, "src"), Probe::script(AVATAR_SCRIPT)],
    banner: vec![
        Probe::attr(BANNER_IMG, "src"),
        Probe::attr(BANNER_DIV, "style").capture(r#"url\("([^"]+)"\)"#),
    ],
});

/// Where to find a profile. The handle may be missing when the only link
/// seen was a generic `/i/user/<id>` one.
#[derive(Debug, Clone)]
pub struct ProfileRef {
    pub url: String,
    pub handle: Option<String>,
}

impl ProfileRef {
    fn handle(&self) -> String {
        self.handle
            .clone()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| {
                self.url
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
            .trim_start_matches('@')
            .to_string()
    }
}

/// Split of the header items strip ("Joined March 2009", "example.com",
/// "Berlin").
#[derive(Debug, Default, PartialEq)]
struct HeaderItems {
    joined: Option<String>,
    website: Option<String>,
    location: Option<String>,
}

fn classify_header_items<'a>(items: impl IntoIterator<Item = &'a str>) -> HeaderItems {
    let mut out = HeaderItems::default();
    for text in items.into_iter().map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(date) = text.strip_prefix("Joined ") {
            out.joined = Some(date.trim().to_string());
        } else if text.starts_with("http") || text.contains('.') {
            out.website = Some(text.to_string());
        } else {
            out.location = Some(text.to_string());
        }
    }
    out
}

async fn texts_of<S: Scope>(scope: &S, xpath: &str) -> Vec<String> {
    let found = match scope.find_all(&Locator::xpath(xpath)).await {
        Ok(found) => found,
        Err(e) => {
            debug!("{} unavailable: {}", xpath, e);
            return Vec::new();
        }
    };
    let mut texts = Vec::with_capacity(found.len());
    for el in &found {
        if let Ok(t) = el.text().await {
            texts.push(t);
        }
    }
    texts
}

async fn labels_of<S: Scope>(scope: &S, xpath: &str) -> Vec<String> {
    let Ok(found) = scope.find_all(&Locator::xpath(xpath)).await else {
        return Vec::new();
    };
    let mut labels = Vec::with_capacity(found.len());
    for el in &found {
        let label: DomResult<Option<String>> = el.attr("aria-label").await;
        match label {
            Ok(Some(l)) if !l.trim().is_empty() => labels.push(l),
            _ => {
                if let Ok(t) = el.text().await {
                    labels.push(t);
                }
            }
        }
    }
    labels
}

/// Follower / following counts from stat link labels ("1.2K Followers").
async fn follow_stats<S: Scope>(scope: &S) -> (Option<u64>, Option<u64>) {
    for xpath in [STAT_LINKS, FOLLOW_LINKS] {
        let mut followers = None;
        let mut following = None;
        for label in labels_of(scope, xpath).await {
            if label.contains("Follower") {
                followers = followers.or(count_in(Some(&label)));
            } else if label.contains("Following") {
                following = following.or(count_in(Some(&label)));
            }
        }
        if followers.is_some() || following.is_some() {
            return (followers, following);
        }
    }
    (None, None)
}

async fn any_present<S: Scope>(scope: &S, xpaths: &[&str]) -> bool {
    for xpath in xpaths {
        if scope.find(&Locator::xpath(*xpath)).await.is_ok() {
            return true;
        }
    }
    false
}

fn user_id_from_source(html: &str) -> Option<String> {
    extract_pattern(&REST_ID, Some(html)).or_else(|| extract_pattern(&ID_STR, Some(html)))
}

/// Open a profile page and read everything it offers. Each field is read on
/// its own and may come back empty; only the handle is always present. A page
/// that cannot be opened is an error, never a row of defaults.
pub async fn scrape_profile<B: Browser>(
    browser: &B,
    profile: &ProfileRef,
    pacing: &Pacing,
) -> Result<ProfileRecord> {
    let p = &*PROBES;
    let handle = profile.handle();

    info!("Opening profile {}", profile.url);
    browser
        .navigate(&profile.url)
        .await
        .with_context(|| format!("Failed to open profile {}", profile.url))?;
    let name_loc = Locator::xpath(USER_NAME);
    let name_ref = &name_loc;
    let ready = pacing
        .settle
        .until(move || async move { browser.find(name_ref).await.is_ok() })
        .await;
    if !ready {
        debug!("Profile header for @{} did not render in time", handle);
    }

    let display_name = best_effort(browser, &p.display_name).await;
    let bio = best_effort(browser, &p.bio).await;

    let header = classify_header_items(texts_of(browser, HEADER_ITEMS).await.iter().map(String::as_str));
    let website_url = best_effort(browser, &p.website_link).await.or(header.website);
    let location = header.location;

    let (followers_count, following_count) = follow_stats(browser).await;
    let tweet_count = count_in(best_effort(browser, &p.posts_tab).await.as_deref());
    let media_count = count_in(best_effort(browser, &p.media_tab).await.as_deref());

    let verification_status = if any_present(browser, VERIFIED_BADGES).await {
        VerificationStatus::Verified
    } else {
        VerificationStatus::Unverified
    };

    let source = browser.source().await.unwrap_or_else(|e| {
        debug!("Page source unavailable: {}", e);
        String::new()
    });

    let protected_status = if any_present(browser, PROTECTED_MARKERS).await
        || PRIVATE_PHRASES.iter().any(|phrase| source.contains(phrase))
    {
        ProtectedStatus::Private
    } else {
        ProtectedStatus::Public
    };

    let account_type = if best_effort(browser, &p.professional).await.is_some() {
        AccountType::BusinessProfessional
    } else {
        AccountType::PersonalUnknown
    };

    let user_id = user_id_from_source(&source);
    let email = extract_pattern(&EMAIL, bio.as_deref());
    let phone = extract_pattern(&PHONE, bio.as_deref()).map(|p| p.trim().to_string());
    let profile_language = best_effort(browser, &p.language).await;
    let profile_image_url = best_effort(browser, &p.avatar).await;
    let banner_image_url = best_effort(browser, &p.banner).await;

    Ok(ProfileRecord {
        username_handle: handle,
        display_name,
        user_id,
        bio,
        email,
        phone,
        address: location.clone(),
        verification_status,
        account_creation_date: header.joined,
        account_type,
        protected_status,
        followers_count,
        following_count,
        tweet_count,
        media_count,
        location,
        website_url,
        profile_language,
        profile_image_url,
        banner_image_url,
    })
}
