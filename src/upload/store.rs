use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Opaque identifier of a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderId(pub String);

impl FolderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
}

impl RemoteEntry {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// The primitives the backup needs from the remote file store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Folders named `name`, scoped to `parent` when given.
    async fn list_folders(&self, name: &str, parent: Option<&FolderId>) -> Result<Vec<RemoteEntry>>;

    async fn create_folder(&self, name: &str, parent: Option<&FolderId>) -> Result<RemoteEntry>;

    async fn upload_file(
        &self,
        file_name: &str,
        local_path: &Path,
        content_type: &str,
        parent: &FolderId,
    ) -> Result<RemoteEntry>;
}
