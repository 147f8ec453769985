use std::error::Error as StdError;
use std::fmt;

use reqwest::{Client, Response, header::COOKIE, redirect};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Redirect target the platform uses when the session is missing or expired.
pub const LOGIN_PATH: &str = "login/index.php";
const MAX_REDIRECTS: usize = 10;

#[derive(Debug)]
struct LoginRedirect;

impl fmt::Display for LoginRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "redirected to {}", LOGIN_PATH)
    }
}

impl StdError for LoginRedirect {}

/// Issues cookie-authenticated GET requests against the platform.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    cookie: String,
    debug: bool,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self> {
        // A login redirect is the only sign of a bad session the platform gives.
        let policy = redirect::Policy::custom(|attempt| {
            if attempt.url().path().ends_with(LOGIN_PATH) {
                attempt.error(LoginRedirect)
            } else if attempt.previous().len() > MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else {
                attempt.follow()
            }
        });

        let client = Client::builder().redirect(policy).build()?;

        Ok(Self {
            client,
            cookie: config.cookie_header(),
            debug: config.debug,
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .header(COOKIE, &self.cookie)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if self.debug {
            info!(url, %status, "GET");
        } else {
            debug!(url, %status, "GET");
        }
        if !status.is_success() {
            warn!(url, %status, "unexpected status");
        }

        Ok(response)
    }

    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let body = self.fetch(url).await?.bytes().await.map_err(classify)?;
        Ok(body.to_vec())
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        self.fetch(url).await?.text().await.map_err(classify)
    }
}

fn classify(err: reqwest::Error) -> Error {
    if err.is_redirect() {
        let mut source = err.source();
        while let Some(inner) = source {
            if inner.is::<LoginRedirect>() {
                return Error::Authentication {
                    url: err.url().map(|u| u.to_string()).unwrap_or_default(),
                };
            }
            source = inner.source();
        }
    }
    Error::Http(err)
}
