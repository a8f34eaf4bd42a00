use super::store::{FolderId, RemoteStore};
use crate::error::{BackupError, Result};
use tracing::{debug, info};

/// Returns the first folder called `name` under `parent`, creating it when
/// none exists. Two concurrent runs may still both create one.
pub async fn get_or_create_folder(
    store: &dyn RemoteStore,
    name: &str,
    parent: Option<&FolderId>,
) -> Result<FolderId> {
    let existing = store
        .list_folders(name, parent)
        .await?
        .into_iter()
        .find(|entry| entry.name == name && entry.is_folder())
        .and_then(|entry| entry.id)
        .filter(|id| !id.is_empty());

    if let Some(id) = existing {
        debug!("Found existing folder '{}': {}", name, id);
        return Ok(FolderId(id));
    }

    info!("Creating folder '{}'", name);
    let created = store.create_folder(name, parent).await?;
    match created.id {
        Some(id) if !id.is_empty() => {
            info!("Created folder '{}': {}", name, id);
            Ok(FolderId(id))
        }
        _ => Err(BackupError::Storage(format!(
            "unable to create destination folder '{}'",
            name
        ))),
    }
}
