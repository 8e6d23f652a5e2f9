use std::collections::HashSet;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::browser::wait::Pacing;
use crate::browser::{Browser, DomError, Key, Locator};
use crate::extract::card::{extract_card, CARD};
use crate::store::PostRecord;

const LIVE_SEARCH_URL: &str = "https://x.com/search?q=%23{tag}&src=typed_query&f=live";
const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";
/// Consecutive passes without a new card before an unlimited run stops.
pub const STAGNATION_THRESHOLD: u32 = 4;

pub fn live_search_url(hashtag: &str) -> String {
    LIVE_SEARCH_URL.replace("{tag}", hashtag.trim_start_matches('#'))
}

/// Loop state: ids seen so far, results in discovery order, and the number of
/// consecutive passes that added nothing.
#[derive(Debug, Default)]
struct Collection {
    seen_ids: HashSet<String>,
    results: Vec<PostRecord>,
    stagnant_count: u32,
}

impl Collection {
    /// Keep `record` unless its id was already emitted.
    fn absorb(&mut self, record: PostRecord) -> bool {
        if !self.seen_ids.insert(record.tweet_id.clone()) {
            return false;
        }
        self.results.push(record);
        true
    }

    fn is_full(&self, limit: Option<usize>) -> bool {
        limit.is_some_and(|n| self.results.len() >= n)
    }

    fn finish(mut self, limit: Option<usize>) -> Vec<PostRecord> {
        if let Some(n) = limit {
            self.results.truncate(n);
        }
        self.results
    }
}

fn progress(limit: Option<usize>) -> ProgressBar {
    match limit {
        Some(n) => {
            let pb = ProgressBar::new(n as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40} {pos}/{len} posts")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {pos} posts {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        }
    }
}

/// Scroll the live results for `hashtag`, collecting unique cards until
/// `limit` is reached or, without a limit, until the feed stops yielding new
/// ones.
pub async fn collect_hashtag<B: Browser>(
    browser: &B,
    hashtag: &str,
    limit: Option<usize>,
    pacing: &Pacing,
) -> Result<Vec<PostRecord>> {
    let url = live_search_url(hashtag);
    let card = Locator::xpath(CARD);
    let body = Locator::tag("body");

    info!("Opening live search: {}", url);
    browser
        .navigate(&url)
        .await
        .with_context(|| format!("Failed to open {}", url))?;
    let card_ref = &card;
    let ready = pacing
        .settle
        .until(move || async move { browser.find(card_ref).await.is_ok() })
        .await;
    if !ready {
        debug!("No cards visible after {:?}, polling anyway", pacing.settle.timeout);
    }

    let mut state = Collection::default();
    if state.is_full(limit) {
        return Ok(Vec::new());
    }
    let pb = progress(limit);
    let mut pass = 0u32;

    loop {
        pass += 1;
        let cards = browser
            .find_all(&card)
            .await
            .context("Failed to query result cards")?;

        let mut new_found = 0usize;
        for c in &cards {
            let record = match extract_card(c).await {
                Ok(r) => r,
                Err(DomError::Stale) => {
                    debug!("Card went stale, skipping");
                    continue;
                }
                Err(e) => {
                    debug!("Card skipped: {}", e);
                    continue;
                }
            };
            if !state.absorb(record) {
                continue;
            }
            new_found += 1;
            pb.inc(1);

            if state.is_full(limit) {
                pb.finish_and_clear();
                info!("Reached limit of {} posts after {} passes", state.results.len(), pass);
                return Ok(state.finish(limit));
            }
        }

        if new_found == 0 {
            state.stagnant_count += 1;
        } else {
            state.stagnant_count = 0;
        }
        debug!(
            "Pass {}: {} cards, {} new, {} total, stagnant {}",
            pass,
            cards.len(),
            new_found,
            state.results.len(),
            state.stagnant_count
        );
        pb.set_message(format!("(pass {})", pass));

        scroll_to_end(browser, &body).await;
        pacing.scroll.pause().await;

        if limit.is_none() && state.stagnant_count >= STAGNATION_THRESHOLD {
            pb.finish_and_clear();
            info!(
                "No new posts for {} passes, stopping with {}",
                STAGNATION_THRESHOLD,
                state.results.len()
            );
            return Ok(state.finish(limit));
        }
    }
}

/// End key on the body, falling back to a scripted scroll.
async fn scroll_to_end<B: Browser>(browser: &B, body: &Locator) {
    if let Err(e) = browser.send_keys(body, Key::End).await {
        debug!("End key failed ({}), scrolling by script", e);
        if let Err(e) = browser.script(SCROLL_SCRIPT).await {
            warn!("Scroll failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeBrowser, FakeElement};
    use crate::extract::card::tests::card;

    fn cards(ids: &[&str]) -> Vec<FakeElement> {
        ids.iter().map(|id| card(id)).collect()
    }

    fn ids(posts: &[PostRecord]) -> Vec<&str> {
        posts.iter().map(|p| p.tweet_id.as_str()).collect()
    }

    #[test]
    fn search_url_strips_hash() {
        assert_eq!(
            live_search_url("#rustlang"),
            "https://x.com/search?q=%23rustlang&src=typed_query&f=live"
        );
    }

    #[tokio::test]
    async fn duplicate_cards_are_emitted_once() {
        let browser = FakeBrowser::with_feed(
            &Locator::xpath(CARD),
            vec![cards(&["1", "1", "2"]), cards(&["2", "1", "3"])],
        );
        let posts = collect_hashtag(&browser, "rust", None, &Pacing::immediate())
            .await
            .unwrap();
        assert_eq!(ids(&posts), vec!["1", "2", "3"]);
        assert_eq!(browser.state().visited[0], live_search_url("rust"));
    }

    #[tokio::test]
    async fn stops_after_four_stagnant_passes() {
        let browser = FakeBrowser::with_feed(
            &Locator::xpath(CARD),
            vec![cards(&["1", "2"]), cards(&["2", "3"]), cards(&["3", "2", "1"])],
        );
        let posts = collect_hashtag(&browser, "rust", None, &Pacing::immediate())
            .await
            .unwrap();
        assert_eq!(ids(&posts), vec!["1", "2", "3"]);

        // Two productive passes, then four that add nothing.
        let state = browser.state();
        assert_eq!(state.scrolls, 6);
    }

    #[tokio::test]
    async fn limit_cuts_mid_pass_in_discovery_order() {
        let snapshots: Vec<Vec<FakeElement>> = (0..50)
            .map(|pass| {
                (0..3)
                    .map(|i| card(&(pass * 3 + i).to_string()))
                    .collect()
            })
            .collect();
        let browser = FakeBrowser::with_feed(&Locator::xpath(CARD), snapshots);

        let posts = collect_hashtag(&browser, "rust", Some(7), &Pacing::immediate())
            .await
            .unwrap();
        assert_eq!(ids(&posts), vec!["0", "1", "2", "3", "4", "5", "6"]);
        assert_eq!(browser.state().scrolls, 2);
    }

    #[tokio::test]
    async fn stale_cards_are_skipped() {
        let browser = FakeBrowser::with_feed(
            &Locator::xpath(CARD),
            vec![vec![card("1"), card("2").stale(), card("3")]],
        );
        let posts = collect_hashtag(&browser, "rust", None, &Pacing::immediate())
            .await
            .unwrap();
        assert_eq!(ids(&posts), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn empty_feed_terminates() {
        let browser = FakeBrowser::with_feed(&Locator::xpath(CARD), vec![Vec::new()]);
        let posts = collect_hashtag(&browser, "rust", None, &Pacing::immediate())
            .await
            .unwrap();
        assert!(posts.is_empty());
        assert_eq!(browser.state().scrolls, STAGNATION_THRESHOLD as usize);
    }

    #[tokio::test]
    async fn scrolls_by_script_when_end_key_fails() {
        let mut browser = FakeBrowser::with_feed(&Locator::xpath(CARD), vec![cards(&["1"])]);
        browser.end_key_fails = true;
        browser
            .scripts
            .insert(SCROLL_SCRIPT.to_string(), serde_json::Value::Null);

        let posts = collect_hashtag(&browser, "rust", None, &Pacing::immediate())
            .await
            .unwrap();
        assert_eq!(ids(&posts), vec!["1"]);

        let state = browser.state();
        assert_eq!(state.scrolls, 0);
        assert_eq!(state.scripts_run.len(), 1 + STAGNATION_THRESHOLD as usize);
        assert!(state.scripts_run.iter().all(|s| s == SCROLL_SCRIPT));
    }
}
