use std::sync::Arc;

use chrono::Utc;
use knowit_core::UploadedDocument;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::subsystems::chat::ChatError;

/// Documents registered through the admin panel, in upload order.
/// Only metadata is kept; nothing is read or indexed.
#[derive(Clone, Default)]
pub struct UploadRegistry {
    documents: Arc<RwLock<Vec<UploadedDocument>>>,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        file_name: &str,
        size_bytes: Option<u64>,
        content_type: Option<String>,
    ) -> Result<UploadedDocument, ChatError> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(ChatError::InvalidUpload("file_name is required".to_string()));
        }
        if file_name.contains(['/', '\\']) {
            return Err(ChatError::InvalidUpload(format!(
                "file_name must not contain a path: {}",
                file_name
            )));
        }

        let document = UploadedDocument {
            id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            size_bytes,
            content_type: content_type.filter(|c| !c.trim().is_empty()),
            uploaded_at: Utc::now(),
        };
        self.documents.write().await.push(document.clone());
        tracing::info!(file = %document.file_name, size = ?document.size_bytes, "document registered");
        Ok(document)
    }

    pub async fn list(&self) -> Vec<UploadedDocument> {
        self.documents.read().await.clone()
    }
}
