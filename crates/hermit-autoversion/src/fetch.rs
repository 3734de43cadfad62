//! URL fetching behind a trait so the engine tests run offline.

use hermit_core::{Error, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Fetches a URL with optional headers, returning the body.
pub trait UrlFetcher: Sync {
    /// Fetch `url`. `headers` are `(name, value)` pairs.
    fn fetch(&self, url: &str, headers: &[(String, String)]) -> Result<Vec<u8>>;
}

/// Blocking HTTP fetcher.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Fetcher with Hermit's user agent and a conservative timeout.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("hermit/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::other("http", e.to_string()))?;
        Ok(Self { client })
    }
}

impl UrlFetcher for HttpFetcher {
    fn fetch(&self, url: &str, headers: &[(String, String)]) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().map_err(|e| Error::Download {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Download {
                url: url.to_string(),
                message: format!("HTTP {status}"),
            });
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| Error::Download {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

/// In-memory fetcher for tests.
#[derive(Debug, Default)]
pub struct MemFetcher {
    responses: HashMap<String, Vec<u8>>,
}

impl MemFetcher {
    /// Empty fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response, builder style.
    #[must_use]
    pub fn with(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.into(), body.into());
        self
    }
}

impl UrlFetcher for MemFetcher {
    fn fetch(&self, url: &str, _headers: &[(String, String)]) -> Result<Vec<u8>> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Download {
                url: url.to_string(),
                message: "not found".to_string(),
            })
    }
}
