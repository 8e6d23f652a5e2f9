//! In-memory page used by tests. Elements are looked up by the exact text of
//! the locator they were registered under, so fixtures reuse the extractors'
//! own locators.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{Browser, DomError, DomResult, Element, Key, Locator, Scope, SessionCookie};

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    attrs: HashMap<String, String>,
    text: String,
    children: HashMap<Locator, Vec<FakeElement>>,
    stale: bool,
}

impl FakeElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_child(mut self, locator: &Locator, child: FakeElement) -> Self {
        self.children.entry(locator.clone()).or_default().push(child);
        self
    }

    pub fn stale(mut self) -> Self {
        self.stale = true;
        self
    }

    fn check(&self) -> DomResult<()> {
        if self.stale {
            Err(DomError::Stale)
        } else {
            Ok(())
        }
    }
}

fn lookup(children: &HashMap<Locator, Vec<FakeElement>>, locator: &Locator) -> DomResult<FakeElement> {
    children
        .get(locator)
        .and_then(|found| found.first())
        .cloned()
        .ok_or_else(|| DomError::Missing(locator.to_string()))
}

#[async_trait]
impl Scope for FakeElement {
    type Handle = FakeElement;

    async fn find(&self, locator: &Locator) -> DomResult<FakeElement> {
        self.check()?;
        lookup(&self.children, locator)
    }

    async fn find_all(&self, locator: &Locator) -> DomResult<Vec<FakeElement>> {
        self.check()?;
        Ok(self.children.get(locator).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl Element for FakeElement {
    async fn attr(&self, name: &str) -> DomResult<Option<String>> {
        self.check()?;
        Ok(self.attrs.get(name).cloned())
    }

    async fn text(&self) -> DomResult<String> {
        self.check()?;
        Ok(self.text.clone())
    }
}

/// A page whose element lists advance one snapshot per `find_all` call on the
/// feed locator, standing in for a results list that grows while scrolling.
#[derive(Default)]
pub struct FakeBrowser {
    pub root: FakeElement,
    pub source: String,
    pub scripts: HashMap<String, Value>,
    pub rejected_cookies: Vec<String>,
    /// URLs whose navigation fails like a dropped connection.
    pub unreachable: Vec<String>,
    pub end_key_fails: bool,
    feed: Option<(Locator, Vec<Vec<FakeElement>>)>,
    state: Mutex<FakeState>,
}

#[derive(Default, Debug)]
pub struct FakeState {
    pub visited: Vec<String>,
    pub polls: usize,
    pub scrolls: usize,
    pub refreshes: usize,
    pub scripts_run: Vec<String>,
    pub cookies: Vec<SessionCookie>,
}

impl FakeBrowser {
    pub fn with_root(root: FakeElement) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    pub fn with_feed(locator: &Locator, snapshots: Vec<Vec<FakeElement>>) -> Self {
        Self {
            feed: Some((locator.clone(), snapshots)),
            ..Self::default()
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Scope for FakeBrowser {
    type Handle = FakeElement;

    async fn find(&self, locator: &Locator) -> DomResult<FakeElement> {
        if let Some((feed_locator, snapshots)) = &self.feed {
            if feed_locator == locator {
                let polls = self.state().polls;
                let idx = polls.min(snapshots.len().saturating_sub(1));
                return snapshots
                    .get(idx)
                    .and_then(|s| s.first())
                    .cloned()
                    .ok_or_else(|| DomError::Missing(locator.to_string()));
            }
        }
        lookup(&self.root.children, locator)
    }

    async fn find_all(&self, locator: &Locator) -> DomResult<Vec<FakeElement>> {
        if let Some((feed_locator, snapshots)) = &self.feed {
            if feed_locator == locator {
                let mut state = self.state();
                let idx = state.polls.min(snapshots.len().saturating_sub(1));
                state.polls += 1;
                return Ok(snapshots.get(idx).cloned().unwrap_or_default());
            }
        }
        Ok(self.root.children.get(locator).cloned().unwrap_or_default())
    }

    async fn script(&self, script: &str) -> DomResult<Value> {
        self.state().scripts_run.push(script.to_string());
        self.scripts
            .get(script)
            .cloned()
            .ok_or(DomError::Driver("script failed".into()))
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn navigate(&self, url: &str) -> DomResult<()> {
        if self.unreachable.iter().any(|u| u == url) {
            return Err(DomError::Driver(format!("net::ERR_CONNECTION_RESET at {}", url)));
        }
        self.state().visited.push(url.to_string());
        Ok(())
    }

    async fn refresh(&self) -> DomResult<()> {
        self.state().refreshes += 1;
        Ok(())
    }

    async fn send_keys(&self, _locator: &Locator, key: Key) -> DomResult<()> {
        if self.end_key_fails {
            return Err(DomError::Driver("element not interactable".into()));
        }
        match key {
            Key::End => self.state().scrolls += 1,
        }
        Ok(())
    }

    async fn source(&self) -> DomResult<String> {
        Ok(self.source.clone())
    }

    async fn add_cookie(&self, cookie: &SessionCookie) -> DomResult<()> {
        if self.rejected_cookies.contains(&cookie.name) {
            return Err(DomError::Driver(format!("invalid cookie domain for {}", cookie.name)));
        }
        self.state().cookies.push(cookie.clone());
        Ok(())
    }
}
