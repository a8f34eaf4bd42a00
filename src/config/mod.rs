mod types;

pub use types::*;

use crate::error::{BackupError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_ENV: &str = "SQL_DRIVE_BACKUP_CONFIG";

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".sql_drive_backup"))
        .unwrap_or_else(|| PathBuf::from(".sql_drive_backup"))
}

pub fn config_path() -> PathBuf {
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => config_dir().join("config.toml"),
    }
}

/// Loads the config file, then applies `DB_*` / `DRIVE_AUTH_CODE` overrides
/// from the process environment (including a `.env` file, if present).
pub fn load() -> Result<AppConfig> {
    let _ = dotenv::dotenv();
    let mut config = load_from(&config_path())?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

pub fn load_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        debug!("Config file not found at {:?}, using defaults", path);
        return Ok(AppConfig::default());
    }

    info!("Loading configuration from {:?}", path);
    let contents = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&contents)?;
    Ok(config)
}

pub fn save_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            info!("Creating config directory: {:?}", parent);
            fs::create_dir_all(parent)?;
        }
    }

    let contents = toml::to_string_pretty(config)?;
    fs::write(path, contents)?;
    info!("Configuration saved to {:?}", path);
    Ok(())
}

pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("DB_HOST") {
        config.database.host = host;
    }
    if let Some(port) = lookup("DB_PORT") {
        config.database.port = port
            .trim()
            .parse()
            .map_err(|_| BackupError::Config(format!("DB_PORT is not a valid port: {}", port)))?;
    }
    if let Some(user) = lookup("DB_USER") {
        config.database.username = user;
    }
    if let Some(password) = lookup("DB_PASSWORD") {
        config.database.password = password;
    }
    if let Some(code) = lookup("DRIVE_AUTH_CODE") {
        config.drive.auth_code = Some(code);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = AppConfig {
            database: DatabaseConfig {
                host: "db.internal".to_string(),
                port: 3307,
                username: "backup".to_string(),
                password: "secret".to_string(),
            },
            drive: DriveConfig {
                root_folder_name: "nightly".to_string(),
                ..DriveConfig::default()
            },
            dump: DumpConfig {
                extra_args: vec!["--single-transaction".to_string()],
                ..DumpConfig::default()
            },
            local_backup_dir: PathBuf::from("/var/backups/mysql"),
            exclude_databases: vec!["scratch".to_string()],
        };

        save_to(&config, &path).unwrap();
        let loaded = load_from(&path).unwrap();

        assert_eq!(loaded.database.host, "db.internal");
        assert_eq!(loaded.database.port, 3307);
        assert_eq!(loaded.drive.root_folder_name, "nightly");
        assert_eq!(loaded.dump.extra_args, vec!["--single-transaction"]);
        assert_eq!(loaded.exclude_databases, vec!["scratch"]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let loaded = load_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(loaded.database.port, 3306);
        assert_eq!(loaded.drive.root_folder_name, "backups_MySQL2GD");
        assert_eq!(loaded.local_backup_dir, PathBuf::from("backups"));
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[database]\nhost = \"10.0.0.5\"\n").unwrap();

        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded.database.host, "10.0.0.5");
        assert_eq!(loaded.database.username, "root");
        assert_eq!(loaded.dump.gzip_path, PathBuf::from("gzip"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DB_HOST", "mysql.local"),
            ("DB_PORT", "3310"),
            ("DB_USER", "dumper"),
            ("DB_PASSWORD", "hunter2"),
            ("DRIVE_AUTH_CODE", "4/abc"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.database.host, "mysql.local");
        assert_eq!(config.database.port, 3310);
        assert_eq!(config.database.username, "dumper");
        assert_eq!(config.database.password, "hunter2");
        assert_eq!(config.drive.auth_code.as_deref(), Some("4/abc"));
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = AppConfig::default();
        let err = apply_env_overrides(&mut config, |k| {
            (k == "DB_PORT").then(|| "not-a-port".to_string())
        })
        .unwrap_err();

        assert!(matches!(err, BackupError::Config(_)));
    }
}
