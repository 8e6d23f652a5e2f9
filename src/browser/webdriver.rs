use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use thirtyfour::prelude::*;
use thirtyfour::{ChromiumLikeCapabilities, Cookie, Key as WdKey};
use tracing::info;

use super::{Browser, DomError, DomResult, Element, Key, Locator, Scope, SessionCookie};

const HEADLESS_ARGS: &[&str] = &[
    "--headless=new",
    "--disable-gpu",
    "--window-size=1920,1080",
    "--no-sandbox",
    "--disable-dev-shm-usage",
];
const HEADED_ARGS: &[&str] = &["--start-maximized"];

impl From<WebDriverError> for DomError {
    fn from(err: WebDriverError) -> Self {
        match err {
            err @ WebDriverError::NoSuchElement(_) => DomError::Missing(err.to_string()),
            WebDriverError::StaleElementReference(_) => DomError::Stale,
            other => DomError::Driver(other.to_string()),
        }
    }
}

fn by(locator: &Locator) -> By {
    match locator {
        Locator::XPath(x) => By::XPath(x.as_str()),
        Locator::Tag(t) => By::Tag(t.as_str()),
    }
}

/// Chrome session driven over a W3C WebDriver endpoint (chromedriver).
pub struct WebDriverSession {
    driver: WebDriver,
}

impl WebDriverSession {
    pub async fn connect(server_url: &str, headless: bool) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        let args = if headless { HEADLESS_ARGS } else { HEADED_ARGS };
        for arg in args {
            caps.add_arg(arg)?;
        }

        info!("Starting Chrome via {} (headless: {})", server_url, headless);
        let driver = WebDriver::new(server_url, caps)
            .await
            .with_context(|| format!("Failed to start a WebDriver session at {}", server_url))?;
        Ok(Self { driver })
    }

    pub async fn quit(self) -> Result<()> {
        self.driver.quit().await.context("Failed to quit the browser session")
    }
}

#[async_trait]
impl Scope for WebDriverSession {
    type Handle = PageElement;

    async fn find(&self, locator: &Locator) -> DomResult<PageElement> {
        Ok(PageElement(self.driver.find(by(locator)).await?))
    }

    async fn find_all(&self, locator: &Locator) -> DomResult<Vec<PageElement>> {
        let found = self.driver.find_all(by(locator)).await?;
        Ok(found.into_iter().map(PageElement).collect())
    }

    async fn script(&self, script: &str) -> DomResult<Value> {
        let ret = self.driver.execute(script, Vec::new()).await?;
        Ok(ret.json().clone())
    }
}

#[async_trait]
impl Browser for WebDriverSession {
    async fn navigate(&self, url: &str) -> DomResult<()> {
        Ok(self.driver.goto(url).await?)
    }

    async fn refresh(&self) -> DomResult<()> {
        Ok(self.driver.refresh().await?)
    }

    async fn send_keys(&self, locator: &Locator, key: Key) -> DomResult<()> {
        let el = self.driver.find(by(locator)).await?;
        let key = match key {
            Key::End => WdKey::End,
        };
        Ok(el.send_keys(key).await?)
    }

    async fn source(&self) -> DomResult<String> {
        Ok(self.driver.source().await?)
    }

    async fn add_cookie(&self, cookie: &SessionCookie) -> DomResult<()> {
        let mut c = Cookie::new(cookie.name.clone(), cookie.value.clone());
        c.domain = cookie.domain.clone();
        c.path = cookie.path.clone();
        c.expiry = cookie.expiry;
        c.secure = cookie.secure;
        c.http_only = cookie.http_only;
        Ok(self.driver.add_cookie(c).await?)
    }
}

pub struct PageElement(WebElement);

#[async_trait]
impl Scope for PageElement {
    type Handle = PageElement;

    async fn find(&self, locator: &Locator) -> DomResult<PageElement> {
        Ok(PageElement(self.0.find(by(locator)).await?))
    }

    async fn find_all(&self, locator: &Locator) -> DomResult<Vec<PageElement>> {
        let found = self.0.find_all(by(locator)).await?;
        Ok(found.into_iter().map(PageElement).collect())
    }
}

#[async_trait]
impl Element for PageElement {
    async fn attr(&self, name: &str) -> DomResult<Option<String>> {
        Ok(self.0.attr(name).await?)
    }

    async fn text(&self) -> DomResult<String> {
        Ok(self.0.text().await?)
    }
}
