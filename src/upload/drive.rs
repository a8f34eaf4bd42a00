use super::store::{FolderId, RemoteEntry, RemoteStore, FOLDER_MIME_TYPE};
use crate::auth::AccessTokenSource;
use crate::config::DriveConfig;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tracing::{debug, info};

const ENTRY_FIELDS: &str = "id, name, mimeType";

pub struct DriveClient {
    client: Client,
    auth: Arc<dyn AccessTokenSource>,
    api_base_url: String,
    upload_base_url: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata<'a> {
    name: &'a str,
    mime_type: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parents: Vec<&'a str>,
}

impl DriveClient {
    pub fn new(config: &DriveConfig, auth: Arc<dyn AccessTokenSource>) -> Result<Self> {
        let client = Client::builder().user_agent("SQL-Drive-Backup/1.0").build()?;

        Ok(Self {
            client,
            auth,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            upload_base_url: config.upload_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn bearer(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.auth.access_token().await?))
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base_url)
    }

    async fn start_upload_session(
        &self,
        file_name: &str,
        content_type: &str,
        size: u64,
        parent: &FolderId,
    ) -> Result<String> {
        let url = format!("{}/upload/drive/v3/files", self.upload_base_url);
        let metadata = FileMetadata {
            name: file_name,
            mime_type: content_type,
            parents: vec![parent.as_str()],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "resumable"), ("fields", ENTRY_FIELDS)])
            .header(AUTHORIZATION, self.bearer().await?)
            .header("X-Upload-Content-Type", content_type)
            .header("X-Upload-Content-Length", size.to_string())
            .json(&metadata)
            .send()
            .await?;
        let response = check_response(response, "start upload").await?;

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| BackupError::Storage("upload session has no Location header".to_string()))
    }
}

/// Quotes a value for the Drive search query language.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn folder_query(name: &str, parent: Option<&FolderId>) -> String {
    let mut query = String::new();
    if let Some(parent) = parent {
        query.push_str(&format!("'{}' in parents and ", escape_query_value(parent.as_str())));
    }
    query.push_str(&format!(
        "name='{}' and trashed = false and mimeType='{}'",
        escape_query_value(name),
        FOLDER_MIME_TYPE
    ));
    query
}

async fn check_response(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = format!("Failed to {}: {} - {}", action, status, text);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BackupError::Auth(message)),
        _ => Err(BackupError::Storage(message)),
    }
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn list_folders(&self, name: &str, parent: Option<&FolderId>) -> Result<Vec<RemoteEntry>> {
        let query = folder_query(name, parent);
        debug!("Searching Drive: {}", query);

        let response = self
            .client
            .get(self.files_url())
            .query(&[
                ("q", query.as_str()),
                ("fields", "nextPageToken, files(id, name, mimeType)"),
                ("spaces", "drive"),
            ])
            .header(AUTHORIZATION, self.bearer().await?)
            .send()
            .await?;
        let response = check_response(response, "list folders").await?;

        let list: FileList = response.json().await?;
        Ok(list.files)
    }

    async fn create_folder(&self, name: &str, parent: Option<&FolderId>) -> Result<RemoteEntry> {
        let metadata = FileMetadata {
            name,
            mime_type: FOLDER_MIME_TYPE,
            parents: parent.map(|p| vec![p.as_str()]).unwrap_or_default(),
        };

        let response = self
            .client
            .post(self.files_url())
            .query(&[("fields", ENTRY_FIELDS)])
            .header(AUTHORIZATION, self.bearer().await?)
            .json(&metadata)
            .send()
            .await?;
        let response = check_response(response, "create folder").await?;

        Ok(response.json().await?)
    }

    async fn upload_file(
        &self,
        file_name: &str,
        local_path: &Path,
        content_type: &str,
        parent: &FolderId,
    ) -> Result<RemoteEntry> {
        let size = tokio::fs::metadata(local_path).await?.len();
        info!(
            "Uploading {} ({:.2} MB) to folder {}",
            file_name,
            size as f64 / 1024.0 / 1024.0,
            parent
        );

        let session_url = self
            .start_upload_session(file_name, content_type, size, parent)
            .await?;
        let file = File::open(local_path).await?;

        let response = self
            .client
            .put(&session_url)
            .header(AUTHORIZATION, self.bearer().await?)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, size)
            .body(Body::from(file))
            .send()
            .await?;
        let response = check_response(response, "upload file").await?;

        let entry: RemoteEntry = response.json().await?;
        info!(
            "Uploaded {} as {}",
            file_name,
            entry.id.as_deref().unwrap_or("<unknown id>")
        );
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    struct FixedToken;

    #[async_trait]
    impl AccessTokenSource for FixedToken {
        async fn access_token(&self) -> Result<String> {
            Ok("test-token".to_string())
        }
    }

    fn client_for(server: &MockServer) -> DriveClient {
        let config = DriveConfig {
            api_base_url: server.base_url(),
            upload_base_url: server.base_url(),
            ..DriveConfig::default()
        };
        DriveClient::new(&config, Arc::new(FixedToken)).unwrap()
    }

    #[test]
    fn test_folder_query_escapes_quotes() {
        let query = folder_query("o'brien", Some(&FolderId("root-1".to_string())));
        assert_eq!(
            query,
            "'root-1' in parents and name='o\\'brien' and trashed = false \
             and mimeType='application/vnd.google-apps.folder'"
        );
    }

    #[test]
    fn test_folder_query_without_parent() {
        assert_eq!(
            folder_query("backups_MySQL2GD", None),
            "name='backups_MySQL2GD' and trashed = false and mimeType='application/vnd.google-apps.folder'"
        );
    }

    #[tokio::test]
    async fn test_list_folders_sends_query_and_bearer() {
        let server = MockServer::start_async().await;
        let parent = FolderId("root-1".to_string());
        let expected_query = folder_query("shop", Some(&parent));

        let mock = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/drive/v3/files")
                    .query_param("q", expected_query.as_str())
                    .header("authorization", "Bearer test-token");
                then.status(200).json_body(json!({
                    "files": [
                        {"id": "f-1", "name": "shop", "mimeType": FOLDER_MIME_TYPE}
                    ]
                }));
            })
            .await;

        let entries = client_for(&server).list_folders("shop", Some(&parent)).await.unwrap();

        assert_eq!(mock.calls(), 1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id.as_deref(), Some("f-1"));
        assert!(entries[0].is_folder());
    }

    #[tokio::test]
    async fn test_create_folder_posts_metadata() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST").path("/drive/v3/files").json_body(json!({
                    "name": "shop",
                    "mimeType": FOLDER_MIME_TYPE,
                    "parents": ["root-1"]
                }));
                then.status(200)
                    .json_body(json!({"id": "new-1", "name": "shop", "mimeType": FOLDER_MIME_TYPE}));
            })
            .await;

        let created = client_for(&server)
            .create_folder("shop", Some(&FolderId("root-1".to_string())))
            .await
            .unwrap();

        assert_eq!(mock.calls(), 1);
        assert_eq!(created.id.as_deref(), Some("new-1"));
    }

    #[tokio::test]
    async fn test_create_root_folder_omits_parents() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST").path("/drive/v3/files").json_body(json!({
                    "name": "backups_MySQL2GD",
                    "mimeType": FOLDER_MIME_TYPE
                }));
                then.status(200).json_body(json!({"id": "root-1"}));
            })
            .await;

        let created = client_for(&server)
            .create_folder("backups_MySQL2GD", None)
            .await
            .unwrap();

        assert_eq!(mock.calls(), 1);
        assert_eq!(created.id.as_deref(), Some("root-1"));
    }

    #[tokio::test]
    async fn test_upload_file_uses_resumable_session() {
        let server = MockServer::start_async().await;
        let session_url = server.url("/upload/session/abc");

        let init = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/upload/drive/v3/files")
                    .query_param("uploadType", "resumable")
                    .header("x-upload-content-type", "application/gzip");
                then.status(200).header("Location", session_url.as_str());
            })
            .await;
        let put = server
            .mock_async(|when, then| {
                when.method("PUT")
                    .path("/upload/session/abc")
                    .header("content-type", "application/gzip")
                    .body("compressed-bytes");
                then.status(200).json_body(json!({
                    "id": "file-9",
                    "name": "shop_2024_03_05.sql.gz",
                    "mimeType": "application/gzip"
                }));
            })
            .await;

        let dir = tempdir().unwrap();
        let path = dir.path().join("shop_2024_03_05.sql.gz");
        fs::write(&path, "compressed-bytes").unwrap();

        let entry = client_for(&server)
            .upload_file(
                "shop_2024_03_05.sql.gz",
                &path,
                "application/gzip",
                &FolderId("shop-folder".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(init.calls(), 1);
        assert_eq!(put.calls(), 1);
        assert_eq!(entry.id.as_deref(), Some("file-9"));
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/drive/v3/files");
                then.status(401).body("invalid credentials");
            })
            .await;

        let err = client_for(&server).list_folders("shop", None).await.unwrap_err();
        assert!(matches!(err, BackupError::Auth(_)));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_storage_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("POST").path("/drive/v3/files");
                then.status(500).body("backend error");
            })
            .await;

        let err = client_for(&server).create_folder("shop", None).await.unwrap_err();
        assert!(matches!(err, BackupError::Storage(_)));
    }
}
