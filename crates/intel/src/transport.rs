//! HTTP seam for the intelligence client.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use chainwatch_core::{Error, Result};

/// Raw response: status plus undecoded body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Issues GET requests. Connection failures surface as `Error::Transport`
/// with the request URL (and so the key) stripped.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!("Intel response ({}): {} bytes", status, body.len());

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_error_does_not_carry_the_key() {
        let transport = ReqwestTransport::new(Duration::from_secs(2)).unwrap();
        let err = transport
            .get("http://127.0.0.1:1/user/?selections=profile&key=S3CR3TKEY")
            .await
            .unwrap_err();

        match err {
            Error::Transport(msg) => assert!(!msg.contains("S3CR3TKEY"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
