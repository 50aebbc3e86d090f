//! Document persistence seam.
//!
//! The engine only ever needs whole documents: resolve one by uri, save it,
//! revert it to its saved state, or delete it. Accept and reject are defined
//! on in-memory content, so the engine treats every store failure after an
//! accept or reject as non-fatal.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tensaku_types::{Document, DocumentUri};
use thiserror::Error;

/// Errors a [`DocumentStore`] can report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("no saved document at {0}")]
    NotFound(DocumentUri),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Where documents live between sessions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load the saved document at `uri`, or `None` if there is none yet.
    async fn resolve(&self, uri: &DocumentUri) -> Result<Option<Document>, StoreError>;

    /// Persist `document` under its own uri.
    async fn save(&self, document: &Document) -> Result<(), StoreError>;

    /// The last saved state of the document at `uri`.
    async fn revert(&self, uri: &DocumentUri) -> Result<Document, StoreError>;

    /// Remove the document at `uri`. Removing a missing document succeeds.
    async fn delete(&self, uri: &DocumentUri) -> Result<(), StoreError>;
}

/// In-memory [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<DocumentUri, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `document`.
    pub fn insert(&self, document: Document) {
        self.documents.write().insert(document.uri().clone(), document);
    }

    pub fn contains(&self, uri: &DocumentUri) -> bool {
        self.documents.read().contains_key(uri)
    }

    pub fn get(&self, uri: &DocumentUri) -> Option<Document> {
        self.documents.read().get(uri).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn resolve(&self, uri: &DocumentUri) -> Result<Option<Document>, StoreError> {
        Ok(self.get(uri))
    }

    async fn save(&self, document: &Document) -> Result<(), StoreError> {
        self.insert(document.clone());
        Ok(())
    }

    async fn revert(&self, uri: &DocumentUri) -> Result<Document, StoreError> {
        self.get(uri).ok_or_else(|| StoreError::NotFound(uri.clone()))
    }

    async fn delete(&self, uri: &DocumentUri) -> Result<(), StoreError> {
        self.documents.write().remove(uri);
        Ok(())
    }
}
