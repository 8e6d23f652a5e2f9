use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{Browser, SessionCookie};

pub const SITE_URL: &str = "https://x.com/";
const COOKIE_DOMAIN: &str = ".x.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCookie {
    name: String,
    value: String,
    path: Option<String>,
    expiry: Option<f64>,
    secure: Option<bool>,
    http_only: Option<bool>,
}

impl StoredCookie {
    fn into_session(self) -> SessionCookie {
        SessionCookie {
            name: self.name,
            value: self.value,
            domain: Some(COOKIE_DOMAIN.to_string()),
            path: self.path,
            expiry: self.expiry.map(|e| e as i64),
            secure: self.secure,
            http_only: self.http_only,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CookieReport {
    pub loaded: usize,
    pub skipped: usize,
}

/// Read the exported cookie file. Fails when the file is missing so a run
/// never continues unauthenticated.
pub fn read_cookie_file(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        bail!(
            "No cookies file found at {}. Export a logged-in session's cookies first.",
            path.display()
        );
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let cookies: Vec<Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of cookies", path.display()))?;
    Ok(cookies)
}

/// Open the site, hand every cookie to the browser and reload.
pub async fn load_cookies<B: Browser>(browser: &B, path: &Path) -> Result<CookieReport> {
    let entries = read_cookie_file(path)?;

    browser.navigate(SITE_URL).await.context("Failed to open site")?;

    let mut report = CookieReport::default();
    for entry in entries {
        let label = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();

        let cookie = match serde_json::from_value::<StoredCookie>(entry) {
            Ok(c) => c.into_session(),
            Err(e) => {
                warn!("Skipped cookie {}: {}", label, e);
                report.skipped += 1;
                continue;
            }
        };

        match browser.add_cookie(&cookie).await {
            Ok(()) => report.loaded += 1,
            Err(e) => {
                warn!("Skipped cookie {}: {}", label, e);
                report.skipped += 1;
            }
        }
    }

    browser.refresh().await.context("Failed to reload after cookies")?;
    info!("Cookies loaded ({} ok, {} skipped)", report.loaded, report.skipped);
    Ok(report)
}
