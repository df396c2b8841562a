//! Access resolution: who can see which document.

use std::sync::Arc;

use fieldbook_core::{Document, DocumentId, DocumentType, Principal};
use fieldbook_store::Store;

use crate::error::Result;

/// Read-only view over share grants.
pub struct AccessResolver<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for AccessResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> AccessResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Whether `principal` holds a grant exposing the document.
    ///
    /// A grant matches with `scope = one` on this document, or with
    /// `scope = all` for this type from the document's owner. Ownership alone
    /// does not count; see [`AccessResolver::can_view`].
    pub async fn has_access(
        &self,
        principal: &Principal,
        document_type: DocumentType,
        document_id: &DocumentId,
    ) -> Result<bool> {
        match self.store.get_document(document_id).await? {
            Some(doc) if doc.document_type == document_type => {
                self.has_access_to(principal, &doc).await
            }
            _ => Ok(false),
        }
    }

    /// Like [`AccessResolver::has_access`] for an already loaded document.
    pub async fn has_access_to(&self, principal: &Principal, document: &Document) -> Result<bool> {
        let grants = self
            .store
            .shares_for_principal(principal, document.document_type)
            .await?;

        Ok(grants.iter().any(|g| {
            g.exposes(
                document.document_type,
                &document.id,
                &document.created_by_id,
            )
        }))
    }

    /// Whether `principal` may read the document: its owner, or a grantee.
    pub async fn can_view(
        &self,
        principal: &Principal,
        document_type: DocumentType,
        document_id: &DocumentId,
    ) -> Result<bool> {
        match self.store.get_document(document_id).await? {
            Some(doc) if doc.document_type == document_type => {
                if doc.is_owned_by_principal(principal) {
                    return Ok(true);
                }
                self.has_access_to(principal, &doc).await
            }
            _ => Ok(false),
        }
    }
}
