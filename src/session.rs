//! Per-owner authenticated session against the LMS.
//!
//! One [`LmsSession`] is created per owner, from credentials or from an
//! imported cookie set, and passed by reference to everything that fetches
//! under that owner. There is no process-wide shared client.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::config::LmsConfig;
use crate::error::LmsError;
use crate::vod::beacon::{BeaconSink, LogBeacon, TrackBeacon};

static LOGIN_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input type="hidden" name="logintoken" value="([^"]+)">"#)
        .expect("static regex is valid")
});
static SESSKEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""sesskey":"([^"]+)""#).expect("static regex is valid"));

/// Authenticated page access, the seam between the session manager and the
/// extractors. Implemented by [`LmsSession`]; tests substitute canned pages.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get_page(&self, url: &str) -> Result<String, LmsError>;
}

/// Serialized session handed over from an external credential store or a
/// web-view SSO flow: the cookie set plus the scraped security token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub cookies: HashMap<String, String>,
    #[serde(default)]
    pub sesskey: Option<String>,
}

pub struct LmsSession {
    client: Client,
    jar: Arc<Jar>,
    base: Url,
    sesskey: RwLock<Option<String>>,
}

impl LmsSession {
    pub fn new(config: &LmsConfig) -> Result<Self, LmsError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| LmsError::Config(format!("invalid LMS_BASE_URL: {e}")))?;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            jar,
            base,
            sesskey: RwLock::new(None),
        })
    }

    /// Rebuild a session from an externally stored cookie set. When the
    /// state carries no security token, one is scraped immediately.
    pub async fn from_state(config: &LmsConfig, state: &SessionState) -> Result<Self, LmsError> {
        let session = Self::new(config)?;
        session.adopt_cookies(&state.cookies);
        match &state.sesskey {
            Some(key) => session.set_sesskey(key.clone()),
            None => session.refresh_token().await?,
        }
        Ok(session)
    }

    /// Adopt an externally obtained cookie set (e.g. from a web-view SSO
    /// flow) and scrape a fresh security token for it.
    pub async fn import_cookies(&self, cookies: &HashMap<String, String>) -> Result<(), LmsError> {
        self.adopt_cookies(cookies);
        self.refresh_token().await
    }

    fn adopt_cookies(&self, cookies: &HashMap<String, String>) {
        for (name, value) in cookies {
            self.jar.add_cookie_str(&format!("{name}={value}"), &self.base);
        }
    }

    /// Password login. Scrapes the one-time login token from the login
    /// page, posts the credential form, and treats the presence of a logout
    /// affordance in the response as the success signal; the site answers
    /// 200 either way, so HTTP status proves nothing.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), LmsError> {
        let login_url = format!("{}/login/index.php", self.base_str());

        let page = self.client.get(&login_url).send().await?.text().await?;
        let logintoken = LOGIN_TOKEN_RE
            .captures(&page)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let response = self
            .client
            .post(&login_url)
            .form(&[
                ("username", username),
                ("password", password),
                ("logintoken", &logintoken),
            ])
            .send()
            .await?;
        let body = response.text().await?;

        if !body.contains("login/logout.php") {
            warn!(username, "login rejected by the site");
            return Err(LmsError::Authentication);
        }

        if let Some(key) = scrape_sesskey(&body) {
            self.set_sesskey(key);
        }
        info!(username, "login successful");
        Ok(())
    }

    /// Probe a protected page. Any redirect to the login path (or a login
    /// form in the body) means the session is no longer valid.
    pub async fn validate(&self) -> Result<bool, LmsError> {
        let url = format!("{}/my/", self.base_str());
        let response = self.client.get(&url).send().await?;
        if response.url().path().starts_with("/login") {
            return Ok(false);
        }
        let body = response.text().await?;
        Ok(!looks_like_login_page(&body))
    }

    /// Scrape the per-session security token from an authenticated page.
    /// Called whenever cookies arrive without an accompanying token.
    pub async fn refresh_token(&self) -> Result<(), LmsError> {
        let url = format!("{}/my/", self.base_str());
        let response = self.client.get(&url).send().await?;
        if response.url().path().starts_with("/login") {
            return Err(LmsError::SessionExpired);
        }
        let body = response.text().await?;
        if looks_like_login_page(&body) {
            return Err(LmsError::SessionExpired);
        }
        match scrape_sesskey(&body) {
            Some(key) => {
                self.set_sesskey(key);
                debug!("security token refreshed");
            }
            None => warn!("authenticated page carried no security token"),
        }
        Ok(())
    }

    /// Current security token, if one has been scraped. Required by some
    /// token-guarded site endpoints consumed by collaborators.
    pub fn sesskey(&self) -> Option<String> {
        self.sesskey.read().ok().and_then(|guard| guard.clone())
    }

    fn set_sesskey(&self, key: String) {
        if let Ok(mut guard) = self.sesskey.write() {
            *guard = Some(key);
        }
    }

    fn base_str(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }
}

#[async_trait]
impl Fetcher for LmsSession {
    async fn get_page(&self, url: &str) -> Result<String, LmsError> {
        let response = self.client.get(url).send().await?;
        // The site answers expired sessions with a redirect chain ending at
        // the login page, not with a 401.
        if response.url().path().starts_with("/login") {
            return Err(LmsError::SessionExpired);
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl BeaconSink for LmsSession {
    async fn send_track(&self, beacon: &TrackBeacon) -> Result<(), LmsError> {
        let url = format!("{}/mod/vod/action.php", self.base_str());
        self.client.post(&url).form(beacon).send().await?;
        Ok(())
    }

    async fn send_log(&self, beacon: &LogBeacon) -> Result<(), LmsError> {
        let url = format!("{}/mod/vod/action.php", self.base_str());
        self.client.post(&url).form(beacon).send().await?;
        Ok(())
    }
}

pub(crate) fn scrape_sesskey(html: &str) -> Option<String> {
    SESSKEY_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Heuristic for "this response is the login page", used both for session
/// validation and for expiry detection on course fetches.
pub(crate) fn looks_like_login_page(html: &str) -> bool {
    (html.contains("login/index.php") && html.contains("<form"))
        || html.contains("Log in to the site")
}
