use crate::config::{AppConfig, DatabaseConfig, DumpConfig};
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, info};

pub const ARCHIVE_EXTENSION: &str = "sql.gz";
pub const ARCHIVE_CONTENT_TYPE: &str = "application/gzip";

#[derive(Debug, Clone, PartialEq)]
pub struct BackupArtifact {
    pub file_name: String,
    pub local_path: PathBuf,
    pub size: u64,
    pub sha256: String,
}

#[async_trait]
pub trait Dumper: Send + Sync {
    async fn dump_database(&self, database: &str) -> Result<BackupArtifact>;
}

/// `<database>_<YYYY_MM_DD>.sql.gz`
pub fn artifact_file_name(database: &str, date: NaiveDate) -> String {
    format!("{}_{}.{}", database, date.format("%Y_%m_%d"), ARCHIVE_EXTENSION)
}

/// Runs `mysqldump` piped into `gzip`, one compressed file per database per day.
pub struct DumpProducer {
    database: DatabaseConfig,
    dump: DumpConfig,
    backup_dir: PathBuf,
}

impl DumpProducer {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            database: config.database.clone(),
            dump: config.dump.clone(),
            backup_dir: config.local_backup_dir.clone(),
        }
    }

    pub async fn dump_on(&self, database: &str, date: NaiveDate) -> Result<BackupArtifact> {
        if database.trim().is_empty() {
            return Err(BackupError::InvalidArgument(
                "a database name is required to produce a dump".to_string(),
            ));
        }

        let file_name = artifact_file_name(database, date);
        let local_path = self.backup_dir.join(&file_name);
        let dump_cmd = self.mysqldump_command(database);
        let gzip_cmd = Command::new(&self.dump.gzip_path);
        let backup_dir = self.backup_dir.clone();
        let dest = local_path.clone();

        info!("Dumping database {} to {}", database, local_path.display());
        let (size, sha256) = tokio::task::spawn_blocking(move || -> Result<(u64, String)> {
            fs::create_dir_all(&backup_dir)?;
            if let Err(e) = run_pipeline(dump_cmd, gzip_cmd, &dest) {
                let _ = fs::remove_file(&dest);
                return Err(e);
            }
            let size = fs::metadata(&dest)?.len();
            let sha256 = calculate_sha256(&dest)?;
            Ok((size, sha256))
        })
        .await??;

        debug!("Dump of {} complete: {} bytes, sha256 {}", database, size, sha256);
        Ok(BackupArtifact {
            file_name,
            local_path,
            size,
            sha256,
        })
    }

    fn mysqldump_command(&self, database: &str) -> Command {
        let mut cmd = Command::new(&self.dump.mysqldump_path);
        cmd.arg("-h")
            .arg(&self.database.host)
            .arg("-P")
            .arg(self.database.port.to_string())
            .arg("-u")
            .arg(&self.database.username)
            .args(&self.dump.extra_args)
            .arg(database);
        if !self.database.password.is_empty() {
            cmd.env("MYSQL_PWD", &self.database.password);
        }
        cmd
    }
}

#[async_trait]
impl Dumper for DumpProducer {
    async fn dump_database(&self, database: &str) -> Result<BackupArtifact> {
        self.dump_on(database, Local::now().date_naive()).await
    }
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

fn ensure_success(program: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(BackupError::Dump(format!(
        "{} exited with {}: {}",
        program,
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

fn run_pipeline(mut dump_cmd: Command, mut gzip_cmd: Command, dest: &Path) -> Result<()> {
    let dump_program = program_name(&dump_cmd);
    let gzip_program = program_name(&gzip_cmd);
    let output_file = File::create(dest)?;

    let mut dump = dump_cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BackupError::Dump(format!("failed to start {}: {}", dump_program, e)))?;
    let dump_stdout = dump
        .stdout
        .take()
        .ok_or_else(|| BackupError::Dump(format!("{} produced no output pipe", dump_program)))?;

    let gzip = gzip_cmd
        .stdin(Stdio::from(dump_stdout))
        .stdout(Stdio::from(output_file))
        .stderr(Stdio::piped())
        .spawn();
    // The command still owns the read end of the pipe; close it so the dump
    // sees SIGPIPE if the compressor exits early.
    drop(gzip_cmd);
    let gzip = match gzip {
        Ok(child) => child,
        Err(e) => {
            let _ = dump.kill();
            let _ = dump.wait();
            return Err(BackupError::Dump(format!("failed to start {}: {}", gzip_program, e)));
        }
    };

    let dump_output = dump.wait_with_output()?;
    let gzip_output = gzip.wait_with_output()?;

    ensure_success(&dump_program, &dump_output)?;
    ensure_success(&gzip_program, &gzip_output)?;
    Ok(())
}

pub fn calculate_sha256(file_path: &Path) -> Result<String> {
    let file = File::open(file_path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn producer(dir: &Path, mysqldump: &str, gzip: &str) -> DumpProducer {
        let mut config = AppConfig::default();
        config.local_backup_dir = dir.join("backups");
        config.database.password = "s3cret".to_string();
        config.dump.mysqldump_path = PathBuf::from(mysqldump);
        config.dump.gzip_path = PathBuf::from(gzip);
        config.dump.extra_args = vec!["--single-transaction".to_string()];
        DumpProducer::new(&config)
    }

    fn march_fifth() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(artifact_file_name("shop", march_fifth()), "shop_2024_03_05.sql.gz");
    }

    #[tokio::test]
    async fn test_dump_writes_pipeline_output() {
        let dir = tempdir().unwrap();
        let producer = producer(dir.path(), "echo", "cat");

        let artifact = producer.dump_on("shop", march_fifth()).await.unwrap();

        assert_eq!(artifact.file_name, "shop_2024_03_05.sql.gz");
        assert_eq!(artifact.local_path, dir.path().join("backups").join("shop_2024_03_05.sql.gz"));

        let contents = fs::read_to_string(&artifact.local_path).unwrap();
        assert_eq!(contents, "-h localhost -P 3306 -u root --single-transaction shop\n");
        assert!(!contents.contains("s3cret"));
        assert_eq!(artifact.size, contents.len() as u64);
        assert_eq!(artifact.sha256, calculate_sha256(&artifact.local_path).unwrap());
    }

    #[tokio::test]
    async fn test_same_day_reuses_file_name() {
        let dir = tempdir().unwrap();
        let producer = producer(dir.path(), "echo", "cat");

        let first = producer.dump_on("orders", march_fifth()).await.unwrap();
        let second = producer.dump_on("orders", march_fifth()).await.unwrap();

        assert_eq!(first.file_name, second.file_name);
        assert_eq!(first.local_path, second.local_path);
    }

    #[tokio::test]
    async fn test_failed_dump_reports_and_removes_file() {
        let dir = tempdir().unwrap();
        let producer = producer(dir.path(), "false", "cat");

        let err = producer.dump_on("orders", march_fifth()).await.unwrap_err();

        assert!(matches!(err, BackupError::Dump(_)));
        assert!(!dir.path().join("backups").join("orders_2024_03_05.sql.gz").exists());
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_dump_error() {
        let dir = tempdir().unwrap();
        let producer = producer(dir.path(), "definitely-not-mysqldump-xyz", "cat");

        let err = producer.dump_on("orders", march_fifth()).await.unwrap_err();
        assert!(matches!(err, BackupError::Dump(_)));
    }

    #[tokio::test]
    async fn test_empty_name_fails_before_running_anything() {
        let dir = tempdir().unwrap();
        let producer = producer(dir.path(), "definitely-not-mysqldump-xyz", "cat");

        let err = producer.dump_on("  ", march_fifth()).await.unwrap_err();

        assert!(matches!(err, BackupError::InvalidArgument(_)));
        assert!(!dir.path().join("backups").exists());
    }

    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_compressor_exit_fails_large_dump_without_hanging() {
        let dir = tempdir().unwrap();
        let mysqldump = script(dir.path(), "big-dump", "head -c 2000000 /dev/zero");
        let producer = producer(dir.path(), &mysqldump, "false");

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            producer.dump_on("orders", march_fifth()),
        )
        .await
        .expect("dump pipeline did not finish after the compressor exited");

        assert!(matches!(result, Err(BackupError::Dump(_))));
        assert!(!dir.path().join("backups").join("orders_2024_03_05.sql.gz").exists());
    }

    #[tokio::test]
    async fn test_real_gzip_output_has_gzip_header() {
        let dir = tempdir().unwrap();
        let producer = producer(dir.path(), "echo", "gzip");

        let artifact = producer.dump_on("shop", march_fifth()).await.unwrap();

        let bytes = fs::read(&artifact.local_path).unwrap();
        assert!(bytes.len() > 2);
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_calculate_sha256() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.txt");

        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"hello world").unwrap();

        let hash = calculate_sha256(&file_path).unwrap();
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
