//! Protocol messages for the remote datastore API.
//!
//! Each request/response pair maps onto one remote operation:
//!
//! | Operation | Request | Response |
//! |---|---|---|
//! | list metadata | [`ListMetaRequest`] | [`ListMetaResponse`] |
//! | put | [`PutRequest`] | [`PutResponse`] |
//! | get | [`GetRequest`] | [`GetResponse`] |
//!
//! Messages are CBOR maps. [`SyncMessage`] adds a one-byte type code in
//! front so a single endpoint can carry any of them.

use crate::change::Change;
use crate::error::{ProtocolError, ProtocolResult};
use docsync_store::{Document, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Endpoint for the list metadata operation.
pub const META_PATH: &str = "/datastore/meta";
/// Endpoint for the put operation.
pub const PUT_PATH: &str = "/datastore/put";
/// Endpoint for the get operation.
pub const GET_PATH: &str = "/datastore/get";

fn to_cbor<T: Serialize>(value: &T) -> ProtocolResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(ProtocolError::encode)?;
    Ok(buf)
}

fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> ProtocolResult<T> {
    ciborium::de::from_reader(bytes).map_err(ProtocolError::decode)
}

macro_rules! cbor_codec {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $ty {
                /// Encodes to CBOR.
                pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
                    to_cbor(self)
                }

                /// Decodes from CBOR.
                pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
                    from_cbor(bytes)
                }
            }
        )*
    };
}

cbor_codec!(
    ListMetaRequest,
    ListMetaResponse,
    PutRequest,
    PutResponse,
    GetRequest,
    GetResponse,
);

/// A sync protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMessage {
    /// List metadata request.
    ListMetaRequest(ListMetaRequest),
    /// List metadata response.
    ListMetaResponse(ListMetaResponse),
    /// Put request.
    PutRequest(PutRequest),
    /// Put response.
    PutResponse(PutResponse),
    /// Get request.
    GetRequest(GetRequest),
    /// Get response.
    GetResponse(GetResponse),
}

impl SyncMessage {
    /// Returns the message type code.
    pub fn type_code(&self) -> u8 {
        match self {
            SyncMessage::ListMetaRequest(_) => 1,
            SyncMessage::ListMetaResponse(_) => 2,
            SyncMessage::PutRequest(_) => 3,
            SyncMessage::PutResponse(_) => 4,
            SyncMessage::GetRequest(_) => 5,
            SyncMessage::GetResponse(_) => 6,
        }
    }
}

/// Encodes a message as `type_code || CBOR(payload)`.
pub fn encode(message: &SyncMessage) -> ProtocolResult<Vec<u8>> {
    let payload = match message {
        SyncMessage::ListMetaRequest(m) => m.encode()?,
        SyncMessage::ListMetaResponse(m) => m.encode()?,
        SyncMessage::PutRequest(m) => m.encode()?,
        SyncMessage::PutResponse(m) => m.encode()?,
        SyncMessage::GetRequest(m) => m.encode()?,
        SyncMessage::GetResponse(m) => m.encode()?,
    };

    let mut out = Vec::with_capacity(payload.len() + 1);
    out.push(message.type_code());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decodes a message produced by [`encode`].
pub fn decode(bytes: &[u8]) -> ProtocolResult<SyncMessage> {
    let (&code, payload) = bytes.split_first().ok_or(ProtocolError::Empty)?;
    let message = match code {
        1 => SyncMessage::ListMetaRequest(ListMetaRequest::decode(payload)?),
        2 => SyncMessage::ListMetaResponse(ListMetaResponse::decode(payload)?),
        3 => SyncMessage::PutRequest(PutRequest::decode(payload)?),
        4 => SyncMessage::PutResponse(PutResponse::decode(payload)?),
        5 => SyncMessage::GetRequest(GetRequest::decode(payload)?),
        6 => SyncMessage::GetResponse(GetResponse::decode(payload)?),
        other => return Err(ProtocolError::UnknownMessageType(other)),
    };
    Ok(message)
}

/// One `(id, mtime)` pair of a remote listing.
///
/// Encoded as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, Timestamp)", into = "(String, Timestamp)")]
pub struct MetaEntry {
    /// Document id.
    pub id: String,
    /// Remote modification instant.
    pub mtime: Timestamp,
}

impl MetaEntry {
    /// Creates an entry.
    pub fn new(id: impl Into<String>, mtime: Timestamp) -> Self {
        Self {
            id: id.into(),
            mtime,
        }
    }
}

impl From<(String, Timestamp)> for MetaEntry {
    fn from((id, mtime): (String, Timestamp)) -> Self {
        Self { id, mtime }
    }
}

impl From<MetaEntry> for (String, Timestamp) {
    fn from(entry: MetaEntry) -> Self {
        (entry.id, entry.mtime)
    }
}

/// Asks for the `(id, mtime)` listing of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMetaRequest {
    /// Remote collection name.
    pub collection: String,
}

impl ListMetaRequest {
    /// Creates a request.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }
}

/// The `(id, mtime)` listing of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMetaResponse {
    /// One entry per remote document.
    pub entries: Vec<MetaEntry>,
}

impl ListMetaResponse {
    /// Creates a response.
    pub fn new(entries: Vec<MetaEntry>) -> Self {
        Self { entries }
    }
}

/// Sends a batch of changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutRequest {
    /// Remote collection name.
    pub collection: String,
    /// Upserts and tombstones.
    pub changes: Vec<Change>,
}

impl PutRequest {
    /// Creates a request.
    pub fn new(collection: impl Into<String>, changes: Vec<Change>) -> Self {
        Self {
            collection: collection.into(),
            changes,
        }
    }

    /// Creates a request made only of upserts.
    pub fn upserts(collection: impl Into<String>, documents: Vec<Document>) -> Self {
        Self::new(collection, documents.into_iter().map(Change::Upsert).collect())
    }
}

/// Acknowledges a put.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResponse {
    /// Number of changes applied.
    pub accepted: u64,
}

impl PutResponse {
    /// Creates a response.
    pub fn new(accepted: u64) -> Self {
        Self { accepted }
    }
}

/// Fetches full documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequest {
    /// Remote collection name.
    pub collection: String,
    /// Requested ids.
    pub ids: Vec<String>,
}

impl GetRequest {
    /// Creates a request.
    pub fn new(collection: impl Into<String>, ids: Vec<String>) -> Self {
        Self {
            collection: collection.into(),
            ids,
        }
    }
}

/// Full documents for a [`GetRequest`].
///
/// Ids the server does not hold are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetResponse {
    /// Returned documents.
    pub documents: Vec<Document>,
}

impl GetResponse {
    /// Creates a response.
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}
