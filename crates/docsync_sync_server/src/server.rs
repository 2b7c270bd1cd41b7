//! Main datastore server.

use crate::config::ServerConfig;
use crate::datastore::Datastore;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use docsync_protocol::{
    GetRequest, GetResponse, ListMetaRequest, ListMetaResponse, PutRequest, PutResponse,
    SyncMessage, GET_PATH, META_PATH, PUT_PATH,
};
use std::sync::Arc;

/// The reference remote datastore.
///
/// Serves the three datastore operations over CBOR bodies. It has no
/// network listener of its own; an HTTP layer (or a loopback client in
/// tests) calls [`SyncServer::handle_post`].
///
/// # Example
///
/// ```
/// use docsync_protocol::{ListMetaRequest, PutRequest};
/// use docsync_store::Document;
/// use docsync_sync_server::{ServerConfig, SyncServer};
///
/// let server = SyncServer::new(ServerConfig::default());
/// let doc = Document::new("a", Default::default()).with_times(1, 100);
/// server.handle_put(PutRequest::upserts("notes", vec![doc])).unwrap();
///
/// let meta = server.handle_list_meta(ListMetaRequest::new("notes")).unwrap();
/// assert_eq!(meta.entries[0].mtime, 100);
/// ```
#[derive(Debug)]
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a new server with an empty datastore.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_datastore(config, Arc::new(Datastore::new()))
    }

    /// Creates a server over an existing datastore.
    pub fn with_datastore(config: ServerConfig, datastore: Arc<Datastore>) -> Self {
        let context = Arc::new(HandlerContext::new(config, datastore));
        let handler = RequestHandler::new(Arc::clone(&context));
        Self { handler, context }
    }

    /// Returns the datastore.
    pub fn datastore(&self) -> &Arc<Datastore> {
        &self.context.datastore
    }

    /// Handles a list metadata request.
    pub fn handle_list_meta(&self, request: ListMetaRequest) -> ServerResult<ListMetaResponse> {
        self.handler.handle_list_meta(request)
    }

    /// Handles a put request.
    pub fn handle_put(&self, request: PutRequest) -> ServerResult<PutResponse> {
        self.handler.handle_put(request)
    }

    /// Handles a get request.
    pub fn handle_get(&self, request: GetRequest) -> ServerResult<GetResponse> {
        self.handler.handle_get(request)
    }

    /// Handles a sync message (dispatches to appropriate handler).
    pub fn handle_message(&self, message: SyncMessage) -> ServerResult<SyncMessage> {
        match message {
            SyncMessage::ListMetaRequest(req) => self
                .handle_list_meta(req)
                .map(SyncMessage::ListMetaResponse),
            SyncMessage::PutRequest(req) => self.handle_put(req).map(SyncMessage::PutResponse),
            SyncMessage::GetRequest(req) => self.handle_get(req).map(SyncMessage::GetResponse),
            other => Err(ServerError::InvalidRequest(format!(
                "unexpected message type {}",
                other.type_code()
            ))),
        }
    }

    /// Handles a POST to one of the datastore endpoints.
    pub fn handle_post(&self, path: &str, body: &[u8]) -> ServerResult<Vec<u8>> {
        let reply = match path {
            META_PATH => self.handle_list_meta(ListMetaRequest::decode(body)?)?.encode()?,
            PUT_PATH => self.handle_put(PutRequest::decode(body)?)?.encode()?,
            GET_PATH => self.handle_get(GetRequest::decode(body)?)?.encode()?,
            other => return Err(ServerError::UnknownEndpoint(other.to_string())),
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_protocol::{Change, MetaEntry};
    use docsync_store::Document;
    use serde_json::json;

    fn doc(id: &str, mtime: i64) -> Document {
        Document::new(id, json!({"v": mtime}).as_object().cloned().unwrap()).with_times(1, mtime)
    }

    #[test]
    fn full_datastore_flow() {
        let server = SyncServer::new(ServerConfig::default());

        let meta = server.handle_list_meta(ListMetaRequest::new("notes")).unwrap();
        assert!(meta.entries.is_empty());

        let put = PutRequest::new(
            "notes",
            vec![Change::Upsert(doc("a", 10)), Change::Upsert(doc("b", 20))],
        );
        assert_eq!(server.handle_put(put).unwrap().accepted, 2);

        let meta = server.handle_list_meta(ListMetaRequest::new("notes")).unwrap();
        assert_eq!(meta.entries, vec![MetaEntry::new("a", 10), MetaEntry::new("b", 20)]);

        let got = server
            .handle_get(GetRequest::new("notes", vec!["b".into()]))
            .unwrap();
        assert_eq!(got.documents, vec![doc("b", 20)]);
    }

    #[test]
    fn message_dispatch() {
        let server = SyncServer::new(ServerConfig::default());
        let reply = server
            .handle_message(SyncMessage::ListMetaRequest(ListMetaRequest::new("notes")))
            .unwrap();
        assert!(matches!(reply, SyncMessage::ListMetaResponse(_)));

        let unexpected = SyncMessage::PutResponse(PutResponse::new(1));
        assert!(server.handle_message(unexpected).is_err());
    }

    #[test]
    fn post_routes_by_path() {
        let server = SyncServer::new(ServerConfig::default());
        let body = PutRequest::upserts("notes", vec![doc("a", 1)]).encode().unwrap();
        let reply = server.handle_post(PUT_PATH, &body).unwrap();
        assert_eq!(PutResponse::decode(&reply).unwrap().accepted, 1);

        let body = ListMetaRequest::new("notes").encode().unwrap();
        let reply = server.handle_post(META_PATH, &body).unwrap();
        assert_eq!(ListMetaResponse::decode(&reply).unwrap().entries.len(), 1);

        assert!(matches!(
            server.handle_post("/datastore/drop", &body),
            Err(ServerError::UnknownEndpoint(_))
        ));
        assert!(matches!(
            server.handle_post(GET_PATH, &[0xFF]),
            Err(ServerError::Protocol(_))
        ));
    }

    #[test]
    fn shared_datastore() {
        let datastore = Arc::new(Datastore::new());
        let server = SyncServer::with_datastore(ServerConfig::default(), Arc::clone(&datastore));
        server
            .handle_put(PutRequest::upserts("notes", vec![doc("a", 1)]))
            .unwrap();
        assert_eq!(datastore.len("notes"), 1);
    }
}
