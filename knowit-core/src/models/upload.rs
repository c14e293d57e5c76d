use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata of a document handed to the admin panel. Contents are never read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub id: Uuid,
    pub file_name: String,
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}
