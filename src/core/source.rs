//! Byte sources a dictionary archive or catalog can be streamed from.

use crate::error::{AedictError, Result};
use reqwest::Url;
use std::io::Read;
use std::time::Duration;

const USER_AGENT: &str = concat!("aedict/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Opens a location as a blocking, streaming byte reader.
///
/// Implementations must not buffer the whole body; the fetcher relies on
/// reading the archive lazily, one chunk at a time.
pub trait ByteSource: Send + Sync {
    fn open(&self, url: &Url) -> Result<Box<dyn Read + Send>>;
}

/// HTTP(S) source backed by a blocking `reqwest` client.
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new() -> Result<Self> {
        // No overall timeout: dictionary archives take minutes on slow links.
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(None)
            .build()?;
        Ok(Self { client })
    }
}

impl ByteSource for HttpSource {
    fn open(&self, url: &Url) -> Result<Box<dyn Read + Send>> {
        tracing::debug!(%url, "Opening connection");
        let response = self.client.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(AedictError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(Box::new(response))
    }
}
