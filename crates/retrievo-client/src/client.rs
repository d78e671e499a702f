//! Retrievo client for connecting to the daemon.

use chrono::{TimeZone, Utc};
use tonic::transport::Channel;
use tracing::{debug, info};

use retrievo_service::pb::{
    retrievo_service_client::RetrievoServiceClient, AddVectorRequest, Document as ProtoDocument,
    DocumentSource as ProtoDocumentSource, GetDocumentRequest, GetIndexStatusRequest,
    IndexStatus, PutDocumentRequest, SearchRequest, SearchResult,
};
use retrievo_types::{Document, DocumentSource};

use crate::error::ClientError;

/// Default endpoint for the retrievo daemon.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:50061";

/// Client for communicating with the retrievo daemon.
pub struct RetrievoClient {
    inner: RetrievoServiceClient<Channel>,
}

impl RetrievoClient {
    /// Connect to the retrievo daemon.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Connection` if connection fails.
    pub async fn connect(endpoint: &str) -> Result<Self, ClientError> {
        info!("Connecting to retrievo daemon at {}", endpoint);
        let inner = RetrievoServiceClient::connect(endpoint.to_string())
            .await
            .map_err(ClientError::Connection)?;
        Ok(Self { inner })
    }

    /// Connect to the default endpoint.
    pub async fn connect_default() -> Result<Self, ClientError> {
        Self::connect(DEFAULT_ENDPOINT).await
    }

    /// Add an embedding bound to `external_id`.
    ///
    /// Returns the vector count after the add.
    pub async fn add_vector(
        &mut self,
        external_id: &str,
        embedding: Vec<f32>,
    ) -> Result<u64, ClientError> {
        debug!(id = %external_id, dim = embedding.len(), "AddVector");
        let response = self
            .inner
            .add_vector(AddVectorRequest {
                external_id: external_id.to_string(),
                embedding,
            })
            .await?;
        Ok(response.into_inner().count)
    }

    /// Nearest documents to `query_embedding`, ascending by distance.
    pub async fn search(
        &mut self,
        query_embedding: Vec<f32>,
        top_k: Option<u32>,
    ) -> Result<Vec<SearchResult>, ClientError> {
        debug!(dim = query_embedding.len(), ?top_k, "Search");
        let response = self
            .inner
            .search(SearchRequest {
                query_embedding,
                top_k,
            })
            .await?;
        Ok(response.into_inner().results)
    }

    /// Store a document. A ULID is assigned by the server when `id` is `None`.
    ///
    /// # Returns
    ///
    /// The document id and whether it was newly created.
    pub async fn put_document(
        &mut self,
        id: Option<&str>,
        text: &str,
        source: DocumentSource,
    ) -> Result<(String, bool), ClientError> {
        let response = self
            .inner
            .put_document(PutDocumentRequest {
                id: id.map(str::to_string),
                text: text.to_string(),
                source: source_to_proto(source) as i32,
            })
            .await?;
        let resp = response.into_inner();

        if resp.created {
            info!("Document stored: {}", resp.id);
        } else {
            debug!("Document already existed (idempotent): {}", resp.id);
        }
        Ok((resp.id, resp.created))
    }

    pub async fn get_document(&mut self, id: &str) -> Result<Option<Document>, ClientError> {
        let response = self
            .inner
            .get_document(GetDocumentRequest { id: id.to_string() })
            .await?;
        response
            .into_inner()
            .document
            .map(proto_to_document)
            .transpose()
    }

    pub async fn index_status(&mut self) -> Result<IndexStatus, ClientError> {
        let response = self.inner.get_index_status(GetIndexStatusRequest {}).await?;
        Ok(response.into_inner())
    }
}

fn source_to_proto(source: DocumentSource) -> ProtoDocumentSource {
    match source {
        DocumentSource::File => ProtoDocumentSource::File,
        DocumentSource::Paste => ProtoDocumentSource::Paste,
    }
}

fn proto_to_document(proto: ProtoDocument) -> Result<Document, ClientError> {
    let source = match ProtoDocumentSource::try_from(proto.source) {
        Ok(ProtoDocumentSource::File) => DocumentSource::File,
        _ => DocumentSource::Paste,
    };
    let created_at = Utc
        .timestamp_millis_opt(proto.created_at_ms)
        .single()
        .ok_or_else(|| {
            ClientError::InvalidResponse(format!("bad timestamp: {}", proto.created_at_ms))
        })?;
    Ok(Document::new(proto.id, proto.text, source).with_created_at(created_at))
}
