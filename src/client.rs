use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::RocError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Obtains the raw body behind a URL.
pub trait PunchTransport: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, RocError>;
}

impl<T: PunchTransport + ?Sized> PunchTransport for std::sync::Arc<T> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, RocError> {
        (**self).fetch(url)
    }
}

/// `<base>?unitId=<race>[&lastId=<cursor>]`
pub fn build_request_url(base: &str, race: u32, cursor: Option<i64>) -> String {
    let mut url = format!("{base}?unitId={race}");
    if let Some(cursor) = cursor {
        url.push_str(&format!("&lastId={cursor}"));
    }
    url
}

#[derive(Clone)]
pub struct RocHttpClient {
    client: Client,
}

impl RocHttpClient {
    pub fn new() -> Result<Self, RocError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, RocError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("roc2rawsplits/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| RocError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| RocError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, RocError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "ROC request failed".to_string());
        Err(RocError::HttpStatus { status, message })
    }
}

impl PunchTransport for RocHttpClient {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, RocError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| RocError::Http(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let bytes = response
            .bytes()
            .map_err(|err| RocError::Http(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}
