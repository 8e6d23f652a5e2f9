mod browser;
mod collect;
mod extract;
mod normalize;
mod originator;
mod store;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use browser::wait::Pacing;
use browser::webdriver::WebDriverSession;
use browser::Browser;
use extract::card::handle_from_profile_url;
use extract::profile::{scrape_profile, ProfileRef};
use originator::OriginatorCandidate;

#[derive(Parser)]
#[command(
    name = "hashtag_scraper",
    about = "Scrape live posts for a hashtag, find the earliest author and scrape their profile"
)]
struct Cli {
    /// Hashtag to search (without the #)
    hashtag: String,

    /// Max posts to collect (default: scroll until no new posts appear)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// Output CSV for collected posts
    #[arg(short = 'o', long, default_value = store::DEFAULT_TWEETS_PATH)]
    output: PathBuf,

    /// Run Chrome without a visible window
    #[arg(long)]
    headless: bool,

    /// Cookies exported from a logged-in browser session (JSON array)
    #[arg(long, default_value = "twitter_cookies.json")]
    cookies: PathBuf,

    /// Profile CSV, appended to on every run
    #[arg(long, default_value = store::DEFAULT_PROFILES_PATH)]
    profiles: PathBuf,

    /// WebDriver endpoint (chromedriver)
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
    webdriver: String,

    /// Pause after each scroll, in milliseconds
    #[arg(long, default_value_t = 1500)]
    scroll_pause_ms: u64,

    /// Skip the search and reuse the posts already in --output
    #[arg(long)]
    skip_search: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let pacing = Pacing::default().with_scroll_pause(Duration::from_millis(cli.scroll_pause_ms));

    let session = WebDriverSession::connect(&cli.webdriver, cli.headless).await?;
    let result = run(&session, &cli, &pacing).await;
    if let Err(e) = session.quit().await {
        warn!("{:#}", e);
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run<B: Browser>(browser: &B, cli: &Cli, pacing: &Pacing) -> Result<()> {
    let hashtag = cli.hashtag.trim_start_matches('#');

    browser::cookies::load_cookies(browser, &cli.cookies).await?;

    if cli.skip_search {
        info!("Skipping search, reusing {}", cli.output.display());
    } else {
        let posts = collect::collect_hashtag(browser, hashtag, cli.limit, pacing).await?;
        store::save_posts(&cli.output, &posts)?;
        println!("[OK] Saved {} rows -> {}", posts.len(), cli.output.display());
    }

    let origin = resolve_originator(&cli.output)?;
    println!("[OK] Originator candidate: {}", origin);

    let profile_ref = profile_ref(&origin)?;
    let profile = scrape_profile(browser, &profile_ref, pacing).await?;
    store::append_profile(&cli.profiles, &profile)?;

    println!("[OK] Originator profile data:");
    for (key, value) in profile.fields() {
        println!("  - {}: {}", key, value);
    }
    Ok(())
}

/// Reload the persisted table so this step does not depend on the search
/// having run in the same process.
fn resolve_originator(path: &Path) -> Result<OriginatorCandidate> {
    let posts = store::load_posts(path)?;
    originator::find_originator(&posts)
        .with_context(|| format!("Cannot pick an originator from {}", path.display()))
}

fn profile_ref(origin: &OriginatorCandidate) -> Result<ProfileRef> {
    let url = origin
        .profile_url
        .clone()
        .with_context(|| format!("Originator post {} has no profile link", origin.tweet_id))?;
    let handle = origin
        .user_handle
        .clone()
        .or_else(|| handle_from_profile_url(&url));
    Ok(ProfileRef { url, handle })
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeBrowser, FakeElement};
    use crate::browser::Locator;
    use crate::extract::card::tests::card;
    use crate::extract::card::CARD;

    fn cli(dir: &tempfile::TempDir, extra: &[&str]) -> Cli {
        let cookies = dir.path().join("cookies.json");
        std::fs::write(&cookies, r#"[{"name":"auth_token","value":"t"}]"#).unwrap();
        let mut args = vec![
            "hashtag_scraper".to_string(),
            "#rust".to_string(),
            "--cookies".to_string(),
            cookies.display().to_string(),
            "--output".to_string(),
            dir.path().join("tweets.csv").display().to_string(),
            "--profiles".to_string(),
            dir.path().join("profiles.csv").display().to_string(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn cli_defaults() {
        let c = Cli::try_parse_from(["hashtag_scraper", "rust"]).unwrap();
        assert_eq!(c.output, PathBuf::from("tweets.csv"));
        assert_eq!(c.profiles, PathBuf::from("profiles.csv"));
        assert_eq!(c.limit, None);
        assert!(!c.headless);
        assert!(Cli::try_parse_from(["hashtag_scraper"]).is_err());
    }

    #[tokio::test]
    async fn pipeline_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let c = cli(&dir, &["--limit", "2"]);
        let browser = FakeBrowser::with_feed(
            &Locator::xpath(CARD),
            vec![vec![card("11"), card("12"), card("13")]],
        );

        run(&browser, &c, &Pacing::immediate()).await.unwrap();

        let posts = store::load_posts(&c.output).unwrap();
        assert_eq!(posts.len(), 2);
        let profiles = std::fs::read_to_string(&c.profiles).unwrap();
        assert_eq!(profiles.lines().count(), 2);
        assert!(profiles.lines().nth(1).unwrap().starts_with("alice,"));

        let visited = browser.state().visited.clone();
        assert_eq!(visited.last().map(String::as_str), Some("https://x.com/alice"));
    }

    #[tokio::test]
    async fn unparseable_times_abort_before_profile() {
        let dir = tempfile::tempdir().unwrap();
        let c = cli(&dir, &["--skip-search"]);
        std::fs::write(&c.output, "tweet_id,post_time,profile_url\n1,soon,https://x.com/a\n").unwrap();
        let browser = FakeBrowser::with_root(FakeElement::new());

        let err = run(&browser, &c, &Pacing::immediate()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("parseable post_time"));
        assert!(!c.profiles.exists());
    }

    #[tokio::test]
    async fn failed_profile_navigation_writes_no_row() {
        let dir = tempfile::tempdir().unwrap();
        let c = cli(&dir, &["--limit", "1"]);
        let mut browser =
            FakeBrowser::with_feed(&Locator::xpath(CARD), vec![vec![card("21")]]);
        browser.unreachable.push("https://x.com/alice".into());

        let err = run(&browser, &c, &Pacing::immediate()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to open profile"));
        assert_eq!(store::load_posts(&c.output).unwrap().len(), 1);
        assert!(!c.profiles.exists());
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
