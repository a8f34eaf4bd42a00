use super::driver::DatabaseDriver;
use crate::config::DatabaseConfig;
use crate::error::Result;
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder};
use tracing::{debug, warn};

pub struct MysqlDriver {
    opts: Opts,
    config: DatabaseConfig,
}

impl MysqlDriver {
    pub fn new(config: &DatabaseConfig) -> Self {
        let opts: Opts = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .user(Some(&config.username))
            .pass(Some(&config.password))
            .into();

        Self {
            opts,
            config: config.clone(),
        }
    }
}

/// A failed disconnect after a successful listing only costs a warning.
fn finish_listing(
    listed: std::result::Result<Vec<String>, mysql_async::Error>,
    closed: std::result::Result<(), mysql_async::Error>,
) -> Result<Vec<String>> {
    let databases = listed?;
    if let Err(e) = closed {
        warn!("Failed to close MySQL connection cleanly: {}", e);
    }
    Ok(databases)
}

#[async_trait]
impl DatabaseDriver for MysqlDriver {
    async fn list_databases(&self) -> Result<Vec<String>> {
        debug!(
            "Connecting to MySQL at {}:{} as {}",
            self.config.host, self.config.port, self.config.username
        );
        let mut conn = Conn::new(self.opts.clone()).await?;
        let listed: std::result::Result<Vec<String>, mysql_async::Error> =
            conn.query("SHOW DATABASES").await;
        let closed = conn.disconnect().await;

        let databases = finish_listing(listed, closed)?;
        debug!("Server reported {} databases", databases.len());
        Ok(databases)
    }

    fn engine_name(&self) -> &'static str {
        "MySQL"
    }
}
