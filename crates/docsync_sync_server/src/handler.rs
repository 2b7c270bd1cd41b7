//! Request handlers for datastore endpoints.

use crate::config::ServerConfig;
use crate::datastore::Datastore;
use crate::error::{ServerError, ServerResult};
use docsync_protocol::{
    GetRequest, GetResponse, ListMetaRequest, ListMetaResponse, PutRequest, PutResponse,
};
use std::sync::Arc;

/// Context for request handling.
#[derive(Debug)]
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Document storage (shared across all handlers).
    pub datastore: Arc<Datastore>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, datastore: Arc<Datastore>) -> Self {
        Self { config, datastore }
    }
}

/// Handler for datastore requests.
#[derive(Debug)]
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a list metadata request.
    pub fn handle_list_meta(&self, request: ListMetaRequest) -> ServerResult<ListMetaResponse> {
        check_collection(&request.collection)?;
        let entries = self.context.datastore.list_meta(&request.collection);
        Ok(ListMetaResponse::new(entries))
    }

    /// Handles a put request.
    pub fn handle_put(&self, request: PutRequest) -> ServerResult<PutResponse> {
        check_collection(&request.collection)?;
        check_batch(request.changes.len(), self.context.config.max_put_batch)?;
        if let Some(change) = request.changes.iter().find(|c| c.id().is_empty()) {
            return Err(ServerError::InvalidRequest(format!(
                "change without an id: {change:?}"
            )));
        }

        let count = request.changes.len();
        let accepted = self
            .context
            .datastore
            .apply(&request.collection, request.changes);
        tracing::debug!(
            collection = %request.collection,
            received = count,
            accepted,
            "applied put"
        );
        Ok(PutResponse::new(accepted))
    }

    /// Handles a get request.
    pub fn handle_get(&self, request: GetRequest) -> ServerResult<GetResponse> {
        check_collection(&request.collection)?;
        check_batch(request.ids.len(), self.context.config.max_get_batch)?;
        let documents = self.context.datastore.get(&request.collection, &request.ids);
        Ok(GetResponse::new(documents))
    }
}

fn check_collection(name: &str) -> ServerResult<()> {
    if name.is_empty() {
        return Err(ServerError::InvalidRequest("empty collection name".into()));
    }
    Ok(())
}

fn check_batch(actual: usize, limit: usize) -> ServerResult<()> {
    if actual > limit {
        return Err(ServerError::BatchTooLarge { limit, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_protocol::Change;
    use docsync_store::Document;
    use serde_json::Map;

    fn handler(config: ServerConfig) -> RequestHandler {
        RequestHandler::new(Arc::new(HandlerContext::new(
            config,
            Arc::new(Datastore::new()),
        )))
    }

    #[test]
    fn rejects_oversized_put() {
        let handler = handler(ServerConfig::new().with_max_put_batch(1));
        let changes = vec![Change::delete("a"), Change::delete("b")];
        let result = handler.handle_put(PutRequest::new("notes", changes));
        assert!(matches!(
            result,
            Err(ServerError::BatchTooLarge { limit: 1, actual: 2 })
        ));
    }

    #[test]
    fn rejects_empty_collection_and_ids() {
        let handler = handler(ServerConfig::default());
        assert!(handler
            .handle_list_meta(ListMetaRequest::new(""))
            .is_err());

        let nameless = Change::Upsert(Document::new("", Map::new()));
        assert!(matches!(
            handler.handle_put(PutRequest::new("notes", vec![nameless])),
            Err(ServerError::InvalidRequest(_))
        ));
    }

    #[test]
    fn put_then_get() {
        let handler = handler(ServerConfig::default());
        let doc = Document::new("a", Map::new()).with_times(1, 7);
        let put = handler
            .handle_put(PutRequest::upserts("notes", vec![doc.clone()]))
            .unwrap();
        assert_eq!(put.accepted, 1);

        let got = handler
            .handle_get(GetRequest::new("notes", vec!["a".into()]))
            .unwrap();
        assert_eq!(got.documents, vec![doc]);
    }
}
