mod driver;
mod mysql;

pub use driver::DatabaseDriver;
pub use mysql::MysqlDriver;

use crate::config::AppConfig;
use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// System catalogs and known non-business databases that are never backed up.
pub const RESERVED_DATABASES: &[&str] = &[
    "information_schema",
    "mysql",
    "performance_schema",
    "sys",
    "teste",
    "updatedb",
];

#[async_trait]
pub trait DatabaseLister: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<String>>;
}

/// Drops every name found in `reserved`, keeping the remaining names in order.
pub fn filter_reserved<S: AsRef<str>>(databases: Vec<String>, reserved: &[S]) -> Vec<String> {
    databases
        .into_iter()
        .filter(|db| !db.is_empty() && !reserved.iter().any(|r| r.as_ref() == db))
        .collect()
}

pub struct DatabaseEnumerator {
    driver: Box<dyn DatabaseDriver>,
    reserved: Vec<String>,
}

impl DatabaseEnumerator {
    pub fn new(driver: Box<dyn DatabaseDriver>, extra_excluded: &[String]) -> Self {
        let mut reserved: Vec<String> = RESERVED_DATABASES.iter().map(|s| s.to_string()).collect();
        for name in extra_excluded {
            if !reserved.contains(name) {
                reserved.push(name.clone());
            }
        }

        Self { driver, reserved }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Box::new(MysqlDriver::new(&config.database)), &config.exclude_databases)
    }
}

#[async_trait]
impl DatabaseLister for DatabaseEnumerator {
    async fn list_databases(&self) -> Result<Vec<String>> {
        let all = self.driver.list_databases().await?;
        let total = all.len();
        let databases = filter_reserved(all, &self.reserved);

        info!(
            "Found {} {} databases to back up ({} excluded)",
            databases.len(),
            self.driver.engine_name(),
            total - databases.len()
        );
        Ok(databases)
    }
}
