//! HTTP remote implementation.
//!
//! This module provides an HTTP-based [`RemoteApi`]. The actual HTTP client
//! is abstracted via a trait to allow different implementations (reqwest,
//! hyper, etc.) or an in-process loopback.

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteApi;
use async_trait::async_trait;
use docsync_protocol::{
    GetRequest, GetResponse, ListMetaRequest, ListMetaResponse, ProtocolResult, PutRequest,
    PutResponse, GET_PATH, META_PATH, PUT_PATH,
};
use parking_lot::RwLock;

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request carrying the session token and returns the
    /// response body.
    async fn post(&self, url: &str, session: &str, body: Vec<u8>) -> Result<Vec<u8>, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based remote.
///
/// Uses CBOR encoding for request/response bodies. Requests are only sent
/// while a session token is set.
pub struct HttpRemote<C: HttpClient> {
    base_url: String,
    client: C,
    session: RwLock<Option<String>>,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpRemote<C> {
    /// Creates a remote without a session.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            session: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }

    /// Sets the session token.
    #[must_use]
    pub fn with_session(self, token: impl Into<String>) -> Self {
        self.set_session(token);
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Establishes a session.
    pub fn set_session(&self, token: impl Into<String>) {
        *self.session.write() = Some(token.into());
    }

    /// Drops the session; subsequent cycles are skipped.
    pub fn clear_session(&self) {
        *self.session.write() = None;
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    async fn post_cbor<Req, Res>(&self, endpoint: &str, request: &Req) -> SyncResult<Res>
    where
        Req: CborEncode + Sync,
        Res: CborDecode,
    {
        let session = self
            .session
            .read()
            .clone()
            .ok_or_else(|| SyncError::transport_fatal("no session"))?;

        let body = request.encode_cbor()?;

        let url = format!("{}{}", self.base_url, endpoint);
        let response_body = self.client.post(&url, &session, body).await.map_err(|e| {
            *self.last_error.write() = Some(e.clone());
            SyncError::transport_retryable(e)
        })?;
        *self.last_error.write() = None;

        Res::decode_cbor(&response_body)
            .map_err(|e| SyncError::malformed(format!("cannot decode {endpoint} response: {e}")))
    }
}

#[async_trait]
impl<C: HttpClient> RemoteApi for HttpRemote<C> {
    fn is_authenticated(&self) -> bool {
        self.session.read().is_some() && self.client.is_healthy()
    }

    async fn list_meta(&self, request: &ListMetaRequest) -> SyncResult<ListMetaResponse> {
        self.post_cbor(META_PATH, request).await
    }

    async fn put(&self, request: &PutRequest) -> SyncResult<PutResponse> {
        self.post_cbor(PUT_PATH, request).await
    }

    async fn get(&self, request: &GetRequest) -> SyncResult<GetResponse> {
        self.post_cbor(GET_PATH, request).await
    }
}

/// Trait for CBOR request bodies.
pub trait CborEncode {
    /// Encodes self to CBOR bytes.
    fn encode_cbor(&self) -> ProtocolResult<Vec<u8>>;
}

/// Trait for CBOR response bodies.
pub trait CborDecode: Sized {
    /// Decodes self from CBOR bytes.
    fn decode_cbor(bytes: &[u8]) -> ProtocolResult<Self>;
}

macro_rules! cbor_body {
    (encode: $($req:ty),*; decode: $($res:ty),*) => {
        $(
            impl CborEncode for $req {
                fn encode_cbor(&self) -> ProtocolResult<Vec<u8>> {
                    self.encode()
                }
            }
        )*
        $(
            impl CborDecode for $res {
                fn decode_cbor(bytes: &[u8]) -> ProtocolResult<Self> {
                    Self::decode(bytes)
                }
            }
        )*
    };
}

cbor_body!(
    encode: ListMetaRequest, PutRequest, GetRequest;
    decode: ListMetaResponse, PutResponse, GetResponse
);

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a POST to `path` and returns the response body.
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String>;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead. The session token
/// is not checked.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

#[async_trait]
impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    async fn post(&self, url: &str, _session: &str, body: Vec<u8>) -> Result<Vec<u8>, String> {
        let path = url.find("/datastore/").map(|i| &url[i..]).unwrap_or(url);
        self.server.handle_post(path, &body)
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_protocol::MetaEntry;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestClient {
        response: RwLock<Option<Vec<u8>>>,
        seen: RwLock<Vec<(String, String)>>,
        healthy: AtomicBool,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                response: RwLock::new(None),
                seen: RwLock::new(Vec::new()),
                healthy: AtomicBool::new(true),
            }
        }

        fn set_response(&self, resp: Vec<u8>) {
            *self.response.write() = Some(resp);
        }
    }

    #[async_trait]
    impl HttpClient for TestClient {
        async fn post(&self, url: &str, session: &str, _body: Vec<u8>) -> Result<Vec<u8>, String> {
            self.seen.write().push((url.to_string(), session.to_string()));
            self.response
                .read()
                .clone()
                .ok_or_else(|| "connection refused".into())
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn authentication_follows_session() {
        let remote = HttpRemote::new("https://api.example.com", TestClient::new());
        assert!(!remote.is_authenticated());

        remote.set_session("token");
        assert!(remote.is_authenticated());

        remote.client.healthy.store(false, Ordering::SeqCst);
        assert!(!remote.is_authenticated());

        remote.client.healthy.store(true, Ordering::SeqCst);
        remote.clear_session();
        assert!(!remote.is_authenticated());
    }

    #[tokio::test]
    async fn list_meta_posts_to_endpoint() {
        let client = TestClient::new();
        client.set_response(
            ListMetaResponse::new(vec![MetaEntry::new("a", 1)])
                .encode()
                .unwrap(),
        );
        let remote = HttpRemote::new("https://api.example.com", client).with_session("s1");

        let resp = remote
            .list_meta(&ListMetaRequest::new("notes"))
            .await
            .unwrap();
        assert_eq!(resp.entries.len(), 1);
        assert_eq!(
            remote.client.seen.read()[0],
            (
                "https://api.example.com/datastore/meta".to_string(),
                "s1".to_string()
            )
        );
    }

    #[tokio::test]
    async fn client_failure_is_retryable() {
        let remote = HttpRemote::new("https://api.example.com", TestClient::new()).with_session("s");
        let err = remote
            .get(&GetRequest::new("notes", vec![]))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(remote.last_error().as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed() {
        let client = TestClient::new();
        client.set_response(vec![0xFF, 0x00]);
        let remote = HttpRemote::new("https://api.example.com", client).with_session("s");

        let err = remote.put(&PutRequest::new("notes", vec![])).await.unwrap_err();
        assert!(matches!(err, SyncError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn no_session_sends_nothing() {
        let remote = HttpRemote::new("https://api.example.com", TestClient::new());
        let err = remote
            .list_meta(&ListMetaRequest::new("notes"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(remote.client.seen.read().is_empty());
    }
}
