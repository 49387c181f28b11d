use anyhow::Result;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

/// Pages larger than this are treated as unavailable.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub const DEFAULT_USER_AGENT: &str = "ferret-bot/0.1";

/// Source of page content for the crawler.
pub trait Fetcher: Send + Sync {
    /// HTML of `url`, following at most `max_redirects` redirects. `None` when the page
    /// is missing, not HTML, or could not be fetched.
    fn fetch(&self, url: &Url, max_redirects: usize) -> Option<String>;
}

/// Blocking HTTP fetcher. Redirects are followed by hand so the bound is per call.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().starts_with("text/html"))
}

fn redirect_target(current: &Url, headers: &HeaderMap) -> Option<Url> {
    let location = headers.get(LOCATION)?.to_str().ok()?;
    current.join(location).ok()
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url, max_redirects: usize) -> Option<String> {
        let mut current = url.clone();
        let mut redirects_left = max_redirects;
        loop {
            let resp = match self.client.get(current.clone()).send() {
                Ok(resp) => resp,
                Err(err) => {
                    tracing::debug!(url = %current, error = %err, "request failed");
                    return None;
                }
            };
            let status = resp.status();

            if status == StatusCode::OK && is_html(resp.headers()) {
                let bytes = match resp.bytes() {
                    Ok(b) => b,
                    Err(err) => {
                        tracing::debug!(url = %current, error = %err, "body read failed");
                        return None;
                    }
                };
                if bytes.len() > MAX_BODY_BYTES {
                    tracing::debug!(url = %current, size = bytes.len(), "page too large");
                    return None;
                }
                return Some(String::from_utf8_lossy(&bytes).into_owned());
            }

            if status.is_redirection() && redirects_left > 0 {
                if let Some(next) = redirect_target(&current, resp.headers()) {
                    tracing::trace!(from = %current, to = %next, "following redirect");
                    redirects_left -= 1;
                    current = next;
                    continue;
                }
            }

            tracing::debug!(url = %current, %status, "page unavailable");
            return None;
        }
    }
}
