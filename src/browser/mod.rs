pub mod cookies;
#[cfg(test)]
pub mod fake;
pub mod wait;
pub mod webdriver;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub type DomResult<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("no element matches {0}")]
    Missing(String),

    #[error("element is no longer attached to the page")]
    Stale,

    #[error("{0} is not available in this scope")]
    Unsupported(&'static str),

    #[error("driver error: {0}")]
    Driver(String),
}

/// How an element is located on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    XPath(String),
    Tag(String),
}

impl Locator {
    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Locator::Tag(name.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::XPath(x) => write!(f, "xpath:{x}"),
            Locator::Tag(t) => write!(f, "tag:{t}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    End,
}

/// A cookie as handed to the browser session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expiry: Option<i64>,
    pub secure: Option<bool>,
    pub http_only: Option<bool>,
}

/// Anything elements can be looked up from: the whole page or one element.
#[async_trait]
pub trait Scope: Send + Sync {
    type Handle: Element;

    async fn find(&self, locator: &Locator) -> DomResult<Self::Handle>;

    async fn find_all(&self, locator: &Locator) -> DomResult<Vec<Self::Handle>>;

    /// Evaluate a script and return its JSON result. Only the page supports it.
    async fn script(&self, _script: &str) -> DomResult<Value> {
        Err(DomError::Unsupported("script"))
    }
}

#[async_trait]
pub trait Element: Scope<Handle = Self> + Sized {
    async fn attr(&self, name: &str) -> DomResult<Option<String>>;

    async fn text(&self) -> DomResult<String>;
}

/// One exclusively-owned browser session.
#[async_trait]
pub trait Browser: Scope {
    async fn navigate(&self, url: &str) -> DomResult<()>;

    async fn refresh(&self) -> DomResult<()>;

    async fn send_keys(&self, locator: &Locator, key: Key) -> DomResult<()>;

    async fn source(&self) -> DomResult<String>;

    async fn add_cookie(&self, cookie: &SessionCookie) -> DomResult<()>;
}
