use crate::backup::dump::{BackupArtifact, Dumper, ARCHIVE_CONTENT_TYPE};
use crate::database::DatabaseLister;
use crate::error::{BackupError, Result};
use crate::upload::{get_or_create_folder, FolderId, RemoteStore, StoreConnector};
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Completed,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct DatabaseOutcome {
    pub database: String,

    pub folder_id: Option<FolderId>,

    pub artifact: Option<BackupArtifact>,

    pub remote_file_id: Option<String>,

    pub error: Option<String>,
}

impl DatabaseOutcome {
    fn new(database: String) -> Self {
        Self {
            database,
            folder_id: None,
            artifact: None,
            remote_file_id: None,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,

    pub outcomes: Vec<DatabaseOutcome>,

    /// Why setup failed, for aborted runs.
    pub error: Option<String>,

    pub duration_secs: u64,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DatabaseOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }
}

/// Drives one backup run: authenticate, resolve the root folder, list the
/// databases, then dump and upload each one in turn.
pub struct BackupOrchestrator {
    connector: Box<dyn StoreConnector>,
    lister: Box<dyn DatabaseLister>,
    dumper: Box<dyn Dumper>,
    root_folder_name: String,
}

impl BackupOrchestrator {
    pub fn new(
        connector: Box<dyn StoreConnector>,
        lister: Box<dyn DatabaseLister>,
        dumper: Box<dyn Dumper>,
        root_folder_name: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            lister,
            dumper,
            root_folder_name: root_folder_name.into(),
        }
    }

    pub async fn run(&self) -> RunReport {
        let start = Instant::now();
        info!("Starting backup run");

        let store = match self.connector.connect().await {
            Ok(store) => store,
            Err(e) => return aborted("authenticate", e, start),
        };

        let root = match get_or_create_folder(store.as_ref(), &self.root_folder_name, None).await {
            Ok(root) => root,
            Err(e) => return aborted("resolve the root folder", e, start),
        };

        let databases = match self.lister.list_databases().await {
            Ok(databases) => databases,
            Err(e) => return aborted("enumerate databases", e, start),
        };

        if databases.is_empty() {
            warn!("No databases to back up");
        }

        let mut outcomes = Vec::with_capacity(databases.len());
        for database in databases {
            outcomes.push(self.back_up_database(store.as_ref(), &root, database).await);
        }

        let report = RunReport {
            state: RunState::Completed,
            outcomes,
            error: None,
            duration_secs: start.elapsed().as_secs(),
        };
        info!(
            "Backup run completed: {} succeeded, {} failed, {} seconds",
            report.succeeded(),
            report.outcomes.len() - report.succeeded(),
            report.duration_secs
        );
        report
    }

    async fn back_up_database(
        &self,
        store: &dyn RemoteStore,
        root: &FolderId,
        database: String,
    ) -> DatabaseOutcome {
        info!("Backing up database: {}", database);
        let mut outcome = DatabaseOutcome::new(database);

        if let Err(e) = self.dump_and_upload(store, root, &mut outcome).await {
            error!(database = %outcome.database, error = %e, "Backup of database failed");
            outcome.error = Some(e.to_string());
        }
        outcome
    }

    async fn dump_and_upload(
        &self,
        store: &dyn RemoteStore,
        root: &FolderId,
        outcome: &mut DatabaseOutcome,
    ) -> Result<()> {
        let folder = get_or_create_folder(store, &outcome.database, Some(root)).await?;
        outcome.folder_id = Some(folder.clone());

        let artifact = self.dumper.dump_database(&outcome.database).await?;
        outcome.artifact = Some(artifact.clone());

        let entry = store
            .upload_file(
                &artifact.file_name,
                &artifact.local_path,
                ARCHIVE_CONTENT_TYPE,
                &folder,
            )
            .await?;
        outcome.remote_file_id = entry.id;

        info!(
            "Successfully backed up {} ({} bytes, sha256 {})",
            outcome.database, artifact.size, artifact.sha256
        );
        Ok(())
    }
}

fn aborted(step: &str, err: BackupError, start: Instant) -> RunReport {
    error!(error = %err, "Backup run aborted: unable to {}", step);
    RunReport {
        state: RunState::Aborted,
        outcomes: Vec::new(),
        error: Some(format!("unable to {}: {}", step, err)),
        duration_secs: start.elapsed().as_secs(),
    }
}
