use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://learn.webwocnurse.com";
pub const DEFAULT_COOKIE_NAME: &str = "TotaraSessionprod";

/// Everything the fetcher needs to talk to the platform.
#[derive(Debug, Clone)]
pub struct Config {
    /// Session cookie value copied from a logged-in browser.
    pub session_token: String,
    pub cookie_name: String,
    /// Scheme and host of the platform, without a trailing slash.
    pub base_url: String,
    /// Log every request with its status.
    pub debug: bool,
}

impl Config {
    pub fn new(session_token: impl Into<String>) -> Self {
        Self {
            session_token: session_token.into(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            debug: false,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Checks the base URL and normalises it to have no trailing slash.
    pub fn validate(mut self) -> Result<Self> {
        let parsed = Url::parse(&self.base_url)
            .map_err(|e| Error::invalid_config(format!("base url {}: {}", self.base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::invalid_config(format!(
                "base url {} must be http or https",
                self.base_url
            )));
        }
        if self.session_token.is_empty() {
            return Err(Error::invalid_config("session cookie is empty"));
        }
        if self.cookie_name.is_empty() || self.cookie_name.contains(['=', ';', ' ']) {
            return Err(Error::invalid_config(format!(
                "invalid cookie name {:?}",
                self.cookie_name
            )));
        }
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn cookie_header(&self) -> String {
        format!("{}={}", self.cookie_name, self.session_token)
    }

    pub fn course_url(&self, course_id: &str) -> String {
        format!("{}/course/view.php?id={}", self.base_url, course_id)
    }

    pub fn loader_url(&self, scorm: &str, sco: &str) -> String {
        format!(
            "{}/mod/scorm/loadSCO.php?a={}&scoid={}&currentorg=&mode=&attempt=1",
            self.base_url, scorm, sco
        )
    }
}
