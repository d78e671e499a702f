//! RetrievoService RPC implementation.
//!
//! Thin adapter between the proto messages and [`RetrievalService`] plus the
//! document store. Domain errors become `Status` through
//! [`RetrievalError`]'s conversion.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{debug, error, info};

use retrievo_storage::Storage;
use retrievo_types::{Document, DocumentSource};

use crate::error::RetrievalError;
use crate::pb::{
    retrievo_service_server::RetrievoService, AddVectorRequest, AddVectorResponse,
    Document as ProtoDocument, DocumentSource as ProtoDocumentSource, GetDocumentRequest,
    GetDocumentResponse, GetIndexStatusRequest, IndexStatus as ProtoIndexStatus,
    PutDocumentRequest, PutDocumentResponse, SearchRequest, SearchResponse, SearchResult,
};
use crate::retrieval::{AddVector, RetrievalService, SearchQuery};

/// Implementation of the RetrievoService gRPC service.
pub struct RetrievoServiceImpl {
    retrieval: Arc<RetrievalService>,
    storage: Arc<Storage>,
}

impl RetrievoServiceImpl {
    pub fn new(retrieval: Arc<RetrievalService>, storage: Arc<Storage>) -> Self {
        Self { retrieval, storage }
    }

    fn convert_source(source: i32) -> DocumentSource {
        match ProtoDocumentSource::try_from(source) {
            Ok(ProtoDocumentSource::File) => DocumentSource::File,
            Ok(ProtoDocumentSource::Paste) | Ok(ProtoDocumentSource::Unspecified) | Err(_) => {
                DocumentSource::Paste
            }
        }
    }

    fn document_to_proto(doc: Document) -> ProtoDocument {
        let source = match doc.source {
            DocumentSource::File => ProtoDocumentSource::File,
            DocumentSource::Paste => ProtoDocumentSource::Paste,
        };
        ProtoDocument {
            created_at_ms: doc.created_at_ms(),
            id: doc.id,
            text: doc.text,
            source: source as i32,
        }
    }
}

#[tonic::async_trait]
impl RetrievoService for RetrievoServiceImpl {
    async fn add_vector(
        &self,
        request: Request<AddVectorRequest>,
    ) -> Result<Response<AddVectorResponse>, Status> {
        let req = request.into_inner();

        let outcome = self
            .retrieval
            .add(AddVector {
                external_id: req.external_id,
                embedding: req.embedding,
            })
            .await?;

        Ok(Response::new(AddVectorResponse {
            status: "ok".to_string(),
            count: outcome.count as u64,
        }))
    }

    async fn search(
        &self,
        request: Request<SearchRequest>,
    ) -> Result<Response<SearchResponse>, Status> {
        let req = request.into_inner();

        let results = self
            .retrieval
            .search(SearchQuery {
                query_embedding: req.query_embedding,
                top_k: req.top_k,
            })
            .await?;

        Ok(Response::new(SearchResponse {
            results: results
                .into_iter()
                .map(|r| SearchResult {
                    id: r.id,
                    text: r.text,
                    distance: r.distance,
                })
                .collect(),
        }))
    }

    async fn put_document(
        &self,
        request: Request<PutDocumentRequest>,
    ) -> Result<Response<PutDocumentResponse>, Status> {
        let req = request.into_inner();
        let source = Self::convert_source(req.source);
        if req.text.trim().is_empty() {
            return Err(RetrievalError::Validation("text must not be empty".into()).into());
        }

        let document = match req.id {
            Some(id) if id.is_empty() => {
                return Err(RetrievalError::Validation("id must not be empty".into()).into());
            }
            Some(id) => Document::new(id, req.text, source),
            None => Document::with_generated_id(req.text, source),
        };

        let created = self.storage.put_document(&document).map_err(|e| {
            error!("Failed to store document: {}", e);
            RetrievalError::from(e)
        })?;

        if created {
            info!(id = %document.id, "Stored new document");
        } else {
            debug!(id = %document.id, "Document already exists (idempotent)");
        }

        Ok(Response::new(PutDocumentResponse {
            id: document.id,
            created,
        }))
    }

    async fn get_document(
        &self,
        request: Request<GetDocumentRequest>,
    ) -> Result<Response<GetDocumentResponse>, Status> {
        let req = request.into_inner();
        if req.id.is_empty() {
            return Err(Status::invalid_argument("id is required"));
        }

        let document = self
            .storage
            .get_document(&req.id)
            .map_err(RetrievalError::from)?
            .map(Self::document_to_proto);

        Ok(Response::new(GetDocumentResponse { document }))
    }

    async fn get_index_status(
        &self,
        _request: Request<GetIndexStatusRequest>,
    ) -> Result<Response<ProtoIndexStatus>, Status> {
        let status = self.retrieval.status().await;

        Ok(Response::new(ProtoIndexStatus {
            count: status.count as u64,
            dimension: status.dimension as u32,
            index_path: status.index_path.to_string_lossy().to_string(),
            size_bytes: status.size_bytes,
        }))
    }
}
