use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: String::new(),
        }
    }
}

/// Google Drive destination and OAuth client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// OAuth client secrets downloaded from the Google API console.
    pub client_secrets_path: PathBuf,
    /// Where the authorization token is persisted between runs.
    pub token_path: PathBuf,
    pub root_folder_name: String,
    pub api_base_url: String,
    pub upload_base_url: String,
    /// Pre-supplied authorization code for headless runs.
    pub auth_code: Option<String>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            client_secrets_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            root_folder_name: "backups_MySQL2GD".to_string(),
            api_base_url: "https://www.googleapis.com".to_string(),
            upload_base_url: "https://www.googleapis.com".to_string(),
            auth_code: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    pub mysqldump_path: PathBuf,
    pub gzip_path: PathBuf,
    pub extra_args: Vec<String>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            mysqldump_path: PathBuf::from("mysqldump"),
            gzip_path: PathBuf::from("gzip"),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_backup_dir")]
    pub local_backup_dir: PathBuf,
    /// Added to the built-in reserved database names.
    #[serde(default)]
    pub exclude_databases: Vec<String>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub dump: DumpConfig,
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            local_backup_dir: default_backup_dir(),
            exclude_databases: Vec::new(),
            database: DatabaseConfig::default(),
            drive: DriveConfig::default(),
            dump: DumpConfig::default(),
        }
    }
}
