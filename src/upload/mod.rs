mod drive;
mod folders;
mod store;

pub use drive::DriveClient;
pub use folders::get_or_create_folder;
pub use store::{FolderId, RemoteEntry, RemoteStore, FOLDER_MIME_TYPE};

use crate::auth::{AuthCodeProvider, CredentialStore};
use crate::config::DriveConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Produces an authenticated remote store; called once per run.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>>;
}

pub struct DriveConnector {
    config: DriveConfig,
    code_provider: Box<dyn AuthCodeProvider>,
}

impl DriveConnector {
    pub fn new(config: &DriveConfig, code_provider: Box<dyn AuthCodeProvider>) -> Self {
        Self {
            config: config.clone(),
            code_provider,
        }
    }
}

#[async_trait]
impl StoreConnector for DriveConnector {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>> {
        let credentials = CredentialStore::from_config(&self.config)?;
        let authorizer = credentials
            .obtain_authorization(self.code_provider.as_ref())
            .await?;
        info!(
            "Authorized with Google Drive (token file {})",
            credentials.token_path().display()
        );

        let client = DriveClient::new(&self.config, Arc::new(authorizer))?;
        Ok(Arc::new(client))
    }
}
