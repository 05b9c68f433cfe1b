//! Rate-limited client for the remote intelligence API.

use std::sync::Arc;

use log::{debug, error};
use serde_json::Value;

use chainwatch_core::intel::IntelligenceSnapshot;
use chainwatch_core::{AppContext, Credential, Error, Result};

use crate::rate_gate::RateGate;
use crate::request::IntelRequest;
use crate::transport::HttpTransport;
use crate::wire::{check_api_error, decode_snapshot};

/// Client for the intelligence API.
///
/// One instance per process: the spacing gate it owns is what makes the
/// 250 ms limit process-wide rather than per endpoint.
pub struct IntelClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    credential: Option<Credential>,
    gate: RateGate,
}

impl IntelClient {
    pub fn new(ctx: &AppContext, transport: Arc<dyn HttpTransport>, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential: ctx.credential().cloned(),
            gate: RateGate::new(),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Issue one request and return the decoded JSON body.
    ///
    /// Fails without touching the network when no credential is set or when
    /// the previous call was less than the minimum spacing ago.
    pub async fn call(&self, request: &IntelRequest) -> Result<Value> {
        let credential = self.credential.as_ref().ok_or(Error::NoCredential)?;
        let url = request.url(&self.base_url, credential)?;
        if !self.gate.try_pass() {
            return Err(Error::RateLimited);
        }

        debug!(
            "Intel call: {} [{}]",
            request.section,
            request.selections.join(",")
        );
        let response = self.transport.get(url.as_str()).await?;

        if response.status != 200 {
            return Err(Error::HttpError(response.status));
        }

        let body: Value = serde_json::from_str(&response.body).map_err(|e| {
            error!("Failed to decode intel response: {}", e);
            Error::ParseError(e.to_string())
        })?;
        check_api_error(&body)?;
        Ok(body)
    }

    /// Fetch and normalize the composite poll snapshot.
    pub async fn fetch_snapshot(&self) -> Result<IntelligenceSnapshot> {
        let body = self.call(&IntelRequest::composite()).await?;
        decode_snapshot(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpResponse;
    use async_trait::async_trait;
    use chainwatch_core::events::EventBus;
    use chainwatch_core::storage::{MemoryLocalStore, CREDENTIAL_SLOT};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Transport that records every URL and replies with a canned response.
    struct RecordingTransport {
        urls: Mutex<Vec<String>>,
        reply: Result<HttpResponse>,
    }

    impl RecordingTransport {
        fn new(reply: Result<HttpResponse>) -> Arc<Self> {
            Arc::new(Self {
                urls: Mutex::new(Vec::new()),
                reply,
            })
        }

        fn ok(body: &str) -> Arc<Self> {
            Self::new(Ok(HttpResponse {
                status: 200,
                body: body.to_string(),
            }))
        }

        fn calls(&self) -> usize {
            self.urls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for RecordingTransport {
        async fn get(&self, url: &str) -> Result<HttpResponse> {
            self.urls.lock().unwrap().push(url.to_string());
            self.reply.clone()
        }
    }

    fn ctx(credential: Option<&str>) -> AppContext {
        let mut store = MemoryLocalStore::new();
        if let Some(key) = credential {
            store = store.with_slot(CREDENTIAL_SLOT, key);
        }
        AppContext::new(EventBus::new(), Arc::new(store)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_credential() {
        let transport = RecordingTransport::ok("{}");
        let client = IntelClient::new(&ctx(None), transport.clone(), "https://api.test");

        let err = client.call(&IntelRequest::composite()).await.unwrap_err();

        assert_eq!(err, Error::NoCredential);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_within_spacing_is_rate_limited() {
        let transport = RecordingTransport::ok("{}");
        let client = IntelClient::new(&ctx(Some("K")), transport.clone(), "https://api.test");

        client.call(&IntelRequest::composite()).await.unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;
        let err = client.call(&IntelRequest::composite()).await.unwrap_err();

        assert_eq!(err, Error::RateLimited);
        assert_eq!(transport.calls(), 1);

        tokio::time::advance(Duration::from_millis(200)).await;
        client.call(&IntelRequest::composite()).await.unwrap();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_is_sent_as_query_parameter() {
        let transport = RecordingTransport::ok("{}");
        let client = IntelClient::new(&ctx(Some("S3CR3T")), transport.clone(), "https://api.test/");

        client.call(&IntelRequest::composite()).await.unwrap();

        let urls = transport.urls.lock().unwrap();
        assert!(urls[0].starts_with("https://api.test/user/?selections="));
        assert!(urls[0].ends_with("&key=S3CR3T"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_base_url_fails_before_the_gate() {
        let transport = RecordingTransport::ok("{}");
        let bad = IntelClient::new(&ctx(Some("K")), transport.clone(), "::nope");
        assert!(matches!(
            bad.call(&IntelRequest::composite()).await,
            Err(Error::Config(_))
        ));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_taxonomy() {
        let cases: Vec<(Result<HttpResponse>, Error)> = vec![
            (
                Err(Error::Transport("connection refused".into())),
                Error::Transport("connection refused".into()),
            ),
            (
                Ok(HttpResponse { status: 502, body: String::new() }),
                Error::HttpError(502),
            ),
            (
                Ok(HttpResponse {
                    status: 200,
                    body: r#"{"error":{"code":5,"error":"Too many requests"}}"#.into(),
                }),
                Error::ApiError(5, "Too many requests".into()),
            ),
        ];

        for (reply, expected) in cases {
            let client = IntelClient::new(&ctx(Some("K")), RecordingTransport::new(reply), "https://api.test");
            assert_eq!(client.call(&IntelRequest::composite()).await.unwrap_err(), expected);
        }

        let client = IntelClient::new(&ctx(Some("K")), RecordingTransport::ok("<html>"), "https://api.test");
        assert!(matches!(
            client.call(&IntelRequest::composite()).await,
            Err(Error::ParseError(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_snapshot() {
        let transport = RecordingTransport::ok(
            r#"{"player_id": 7, "faction": {"faction_id": 55}, "chain": {"current": 5, "timeout": 40}}"#,
        );
        let client = IntelClient::new(&ctx(Some("K")), transport, "https://api.test");

        let snapshot = client.fetch_snapshot().await.unwrap();

        assert_eq!(snapshot.user.id, 7);
        assert_eq!(snapshot.faction_id, Some(55));
        assert!(snapshot.chain.is_active());
    }
}
