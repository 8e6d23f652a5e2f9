pub mod card;
pub mod profile;

use regex::Regex;
use serde_json::Value;
use tracing::trace;

use crate::browser::{DomError, DomResult, Element, Locator, Scope};
use crate::normalize::extract_pattern;

enum Source {
    Text(Locator),
    Attr(Locator, &'static str),
    /// `aria-label`, falling back to the visible text.
    Label(Locator),
    Script(String),
}

/// One way of reading a field. Fields carry an ordered list of these; the
/// first one producing a non-empty value wins.
pub struct Probe {
    source: Source,
    pattern: Option<Regex>,
}

impl Probe {
    fn from_source(source: Source) -> Self {
        Self { source, pattern: None }
    }

    pub fn text(xpath: &str) -> Self {
        Self::from_source(Source::Text(Locator::xpath(xpath)))
    }

    pub fn attr(xpath: &str, name: &'static str) -> Self {
        Self::from_source(Source::Attr(Locator::xpath(xpath), name))
    }

    pub fn label(xpath: &str) -> Self {
        Self::from_source(Source::Label(Locator::xpath(xpath)))
    }

    pub fn script(js: impl Into<String>) -> Self {
        Self::from_source(Source::Script(js.into()))
    }

    /// Keep only the first capture group of `pattern` in the value read.
    pub fn capture(mut self, pattern: &str) -> Self {
        self.pattern = Some(Regex::new(pattern).unwrap());
        self
    }

    async fn read<S: Scope>(&self, scope: &S) -> DomResult<Option<String>> {
        let raw = match &self.source {
            Source::Text(loc) => Some(scope.find(loc).await?.text().await?),
            Source::Attr(loc, name) => scope.find(loc).await?.attr(name).await?,
            Source::Label(loc) => {
                let el = scope.find(loc).await?;
                match el.attr("aria-label").await? {
                    Some(label) if !label.trim().is_empty() => Some(label),
                    _ => Some(el.text().await?),
                }
            }
            Source::Script(js) => match scope.script(js).await? {
                Value::String(s) => Some(s),
                _ => None,
            },
        };

        let value = match &self.pattern {
            Some(re) => extract_pattern(re, raw.as_deref()),
            None => raw,
        };
        Ok(value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }
}

/// Run the probes in order and return the first hit.
///
/// Missing elements and driver hiccups count as a miss for that probe only. A
/// stale element is returned as an error since every later probe against the
/// same scope would fail the same way.
pub async fn first_match<S: Scope>(scope: &S, probes: &[Probe]) -> DomResult<Option<String>> {
    for probe in probes {
        match probe.read(scope).await {
            Ok(Some(v)) => return Ok(Some(v)),
            Ok(None) => {}
            Err(DomError::Stale) => return Err(DomError::Stale),
            Err(e) => trace!("probe missed: {}", e),
        }
    }
    Ok(None)
}

/// Page-level variant: nothing is worth aborting for, so staleness is a miss too.
pub async fn best_effort<S: Scope>(scope: &S, probes: &[Probe]) -> Option<String> {
    first_match(scope, probes).await.unwrap_or_else(|e| {
        trace!("field dropped: {}", e);
        None
    })
}
