//! Plain HTTP fetch used for caption probes and manifest variant scans.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Small fetch surface so tests can substitute canned bodies.
pub trait ResourceFetcher: Send + Sync {
    fn fetch_text(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<String>;
}

/// libcurl-backed fetcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurlFetcher;

impl ResourceFetcher for CurlFetcher {
    /// GET the URL and return the body as (lossy) text.
    ///
    /// Runs in the current thread; call from `spawn_blocking` if used from
    /// async code.
    fn fetch_text(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<String> {
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url).context("invalid URL")?;
        easy.follow_location(true)?;
        easy.connect_timeout(Duration::from_secs(10))?;
        easy.timeout(timeout)?;

        let mut list = curl::easy::List::new();
        for (k, v) in headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        if !headers.is_empty() {
            easy.http_headers(list)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform().context("GET request failed")?;
        }

        let code = easy.response_code().context("no response code")?;
        if !(200..300).contains(&code) {
            anyhow::bail!("GET {} returned HTTP {}", url, code);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
