mod provider;
mod secrets;
mod token;

pub use provider::{AuthCodeProvider, ConsoleCodeProvider, StaticCodeProvider};
pub use secrets::ClientSecrets;
pub use token::AuthorizationToken;

use crate::config::DriveConfig;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use token::TokenResponse;
use tracing::{debug, info};

/// Per-file access to the files this app creates.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Anything able to hand out a bearer token for the remote store.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Loads the persisted token, or runs the authorization code exchange and
/// persists its result.
pub struct CredentialStore {
    secrets: ClientSecrets,
    token_path: PathBuf,
    client: Client,
}

impl CredentialStore {
    pub fn new(secrets: ClientSecrets, token_path: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder().user_agent("SQL-Drive-Backup/1.0").build()?;

        Ok(Self {
            secrets,
            token_path: token_path.into(),
            client,
        })
    }

    pub fn from_config(config: &DriveConfig) -> Result<Self> {
        let secrets = ClientSecrets::load(&config.client_secrets_path)?;
        Self::new(secrets, &config.token_path)
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    pub fn authorization_url(&self) -> Result<String> {
        let url = Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("access_type", "offline"),
                ("scope", DRIVE_SCOPE),
                ("response_type", "code"),
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", self.secrets.redirect_uri()),
            ],
        )
        .map_err(|e| BackupError::Config(format!("Invalid auth_uri {}: {}", self.secrets.auth_uri, e)))?;

        Ok(url.to_string())
    }

    pub async fn obtain_authorization(&self, provider: &dyn AuthCodeProvider) -> Result<Authorizer> {
        if let Some(token) = AuthorizationToken::load(&self.token_path) {
            debug!("Reusing stored authorization from {}", self.token_path.display());
            return Ok(self.authorizer(token));
        }

        info!("No usable stored authorization, starting the authorization exchange");
        let auth_url = self.authorization_url()?;
        let code = provider.authorization_code(&auth_url).await?;
        let code = code.trim();
        if code.is_empty() {
            return Err(BackupError::Auth("authorization code is empty".to_string()));
        }

        let token = self.exchange_code(code).await?;
        token.save(&self.token_path)?;
        Ok(self.authorizer(token))
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthorizationToken> {
        let form = [
            ("code", code),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("redirect_uri", self.secrets.redirect_uri()),
            ("grant_type", "authorization_code"),
        ];

        let response = request_token(&self.client, &self.secrets.token_uri, &form).await?;
        Ok(response.into_token(Utc::now()))
    }

    fn authorizer(&self, token: AuthorizationToken) -> Authorizer {
        Authorizer {
            secrets: self.secrets.clone(),
            client: self.client.clone(),
            token: Mutex::new(token),
        }
    }
}

/// An authorized session. Refreshes its access token in memory when it
/// expires; the persisted file is left as written by the exchange.
pub struct Authorizer {
    secrets: ClientSecrets,
    client: Client,
    token: Mutex<AuthorizationToken>,
}

impl Authorizer {
    async fn refresh(&self, token: &mut AuthorizationToken, refresh_token: &str) -> Result<()> {
        debug!("Access token expired, refreshing");
        let form = [
            ("refresh_token", refresh_token),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = request_token(&self.client, &self.secrets.token_uri, &form).await?;
        let mut refreshed = response.into_token(Utc::now());
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = Some(refresh_token.to_string());
        }
        *token = refreshed;
        Ok(())
    }
}

#[async_trait]
impl AccessTokenSource for Authorizer {
    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if token.is_expired(Utc::now()) {
            if let Some(refresh_token) = token.refresh_token.clone() {
                self.refresh(&mut token, &refresh_token).await?;
            }
        }
        Ok(token.access_token.clone())
    }
}

async fn request_token(client: &Client, token_uri: &str, form: &[(&str, &str)]) -> Result<TokenResponse> {
    let response = client
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| BackupError::Auth(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(BackupError::Auth(format!(
            "token endpoint returned {} - {}",
            status, text
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| BackupError::Auth(format!("unreadable token response: {}", e)))
}
