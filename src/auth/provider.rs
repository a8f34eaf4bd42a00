use crate::error::{BackupError, Result};
use async_trait::async_trait;
use console::style;
use dialoguer::Input;

/// Supplies the one-time code the operator receives after granting access.
#[async_trait]
pub trait AuthCodeProvider: Send + Sync {
    async fn authorization_code(&self, auth_url: &str) -> Result<String>;
}

/// Prints the consent URL and reads the code from the terminal.
pub struct ConsoleCodeProvider;

#[async_trait]
impl AuthCodeProvider for ConsoleCodeProvider {
    async fn authorization_code(&self, auth_url: &str) -> Result<String> {
        println!("\n{}", style("Authorize this app by visiting this url:").cyan().bold());
        println!("{}\n", style(auth_url).underlined());

        tokio::task::spawn_blocking(|| {
            Input::<String>::new()
                .with_prompt("Enter the code from that page here")
                .interact_text()
                .map_err(|e| BackupError::Auth(e.to_string()))
        })
        .await?
    }
}

/// A code handed over ahead of time, for headless runs.
pub struct StaticCodeProvider {
    code: String,
}

impl StaticCodeProvider {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

#[async_trait]
impl AuthCodeProvider for StaticCodeProvider {
    async fn authorization_code(&self, _auth_url: &str) -> Result<String> {
        Ok(self.code.clone())
    }
}
