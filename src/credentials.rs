//! Google credentials for the Vertex AI endpoint.
//!
//! Environment variables are checked first, then a service-account JSON file.
//! When neither yields credentials the caller runs with generation disabled.
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::GenerateError;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Tokens are refreshed this long before Google says they expire.
const REFRESH_MARGIN_SECS: i64 = 60;

pub const ENV_PROJECT_ID: &str = "GOOGLE_PROJECT_ID";
pub const ENV_CLIENT_EMAIL: &str = "GOOGLE_CLIENT_EMAIL";
pub const ENV_PRIVATE_KEY: &str = "GOOGLE_PRIVATE_KEY";
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_ACCESS_TOKEN";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid credentials: {0}")]
    Invalid(&'static str),
    #[error("invalid private key: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccount),
    /// A bearer token minted elsewhere (e.g. `gcloud auth print-access-token`).
    AccessToken { project_id: String, token: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ServiceAccount(account) => fmt::Debug::fmt(account, f),
            Credentials::AccessToken { project_id, .. } => f
                .debug_struct("AccessToken")
                .field("project_id", project_id)
                .finish_non_exhaustive(),
        }
    }
}

impl Credentials {
    pub fn project_id(&self) -> &str {
        match self {
            Credentials::ServiceAccount(account) => &account.project_id,
            Credentials::AccessToken { project_id, .. } => project_id,
        }
    }

    /// Who the requests are made as, for logs.
    pub fn principal(&self) -> &str {
        match self {
            Credentials::ServiceAccount(account) => &account.client_email,
            Credentials::AccessToken { .. } => "<access token>",
        }
    }

    /// Parse a service-account JSON document.
    pub fn from_service_account_json(raw: &str) -> Result<Self, CredentialError> {
        let account: ServiceAccount = serde_json::from_str(raw)?;
        if account.project_id.trim().is_empty() {
            return Err(CredentialError::Invalid("project_id must be non-empty"));
        }
        if account.client_email.trim().is_empty() {
            return Err(CredentialError::Invalid("client_email must be non-empty"));
        }
        if account.private_key.trim().is_empty() {
            return Err(CredentialError::Invalid("private_key must be non-empty"));
        }
        Ok(Credentials::ServiceAccount(account))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CredentialSource {
    Environment,
    File,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Environment => "environment",
            CredentialSource::File => "file",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub credentials: Credentials,
    pub source: CredentialSource,
}

/// Resolve credentials from the process environment, falling back to `credential_file`.
/// Errors are logged and reported as `None`.
pub fn resolve(credential_file: &Path) -> Option<Resolved> {
    match resolve_with(|key| std::env::var(key).ok(), credential_file) {
        Ok(Some(resolved)) => {
            info!(
                source = resolved.source.as_str(),
                project = resolved.credentials.project_id(),
                "loaded Google credentials"
            );
            Some(resolved)
        }
        Ok(None) => {
            error!(
                file = %credential_file.display(),
                "no Google credentials found (environment or file); generation disabled"
            );
            None
        }
        Err(err) => {
            error!(%err, "failed to load Google credentials; generation disabled");
            None
        }
    }
}

/// Same as [`resolve`] with an injectable environment lookup.
///
/// A complete set of environment variables wins. An incomplete set is
/// ignored with a warning and the file is consulted instead.
pub fn resolve_with<F>(lookup: F, credential_file: &Path) -> Result<Option<Resolved>, CredentialError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(credentials) = from_env(&lookup) {
        return Ok(Some(Resolved {
            credentials,
            source: CredentialSource::Environment,
        }));
    }

    if !credential_file.exists() {
        debug!(file = %credential_file.display(), "credential file not found");
        return Ok(None);
    }
    let raw = std::fs::read_to_string(credential_file)?;
    let credentials = Credentials::from_service_account_json(&raw)?;
    Ok(Some(Resolved {
        credentials,
        source: CredentialSource::File,
    }))
}

fn from_env<F>(lookup: &F) -> Option<Credentials>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    let project_id = get(ENV_PROJECT_ID)?;

    match (get(ENV_CLIENT_EMAIL), get(ENV_PRIVATE_KEY)) {
        (Some(client_email), Some(private_key)) => {
            return Some(Credentials::ServiceAccount(ServiceAccount {
                project_id,
                client_email,
                // hosted env editors store the PEM on one line with literal \n
                private_key: private_key.replace("\\n", "\n"),
                token_uri: default_token_uri(),
            }));
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!("only one of GOOGLE_CLIENT_EMAIL and GOOGLE_PRIVATE_KEY is set; ignoring them");
        }
        (None, None) => {}
    }

    if let Some(token) = get(ENV_ACCESS_TOKEN) {
        return Some(Credentials::AccessToken { project_id, token });
    }

    warn!("GOOGLE_PROJECT_ID is set without a key or access token; ignoring environment");
    None
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Hands out bearer tokens for the configured credentials, caching
/// service-account tokens until shortly before they expire.
pub struct TokenProvider {
    http: Client,
    credentials: Credentials,
    signer: Option<EncodingKey>,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    /// Fails when a service-account private key is not a valid RSA PEM.
    pub fn new(http: Client, credentials: Credentials) -> Result<Self, CredentialError> {
        let signer = match &credentials {
            Credentials::ServiceAccount(account) => {
                Some(EncodingKey::from_rsa_pem(account.private_key.as_bytes())?)
            }
            Credentials::AccessToken { .. } => None,
        };
        Ok(Self {
            http,
            credentials,
            signer,
            cached: Mutex::new(None),
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub async fn bearer(&self) -> Result<String, GenerateError> {
        let (account, signer) = match (&self.credentials, &self.signer) {
            (Credentials::AccessToken { token, .. }, _) => return Ok(token.clone()),
            (Credentials::ServiceAccount(account), Some(signer)) => (account, signer),
            (Credentials::ServiceAccount(_), None) => return Err(GenerateError::AuthNotConfigured),
        };

        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(token.token.clone());
            }
        }

        let fresh = self.exchange(account, signer, now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn exchange(
        &self,
        account: &ServiceAccount,
        signer: &EncodingKey,
        now: DateTime<Utc>,
    ) -> Result<CachedToken, GenerateError> {
        let assertion = build_assertion(account, signer, now)
            .map_err(|err| GenerateError::upstream(None, format!("failed to sign token request: {err}")))?;

        debug!(token_uri = %account.token_uri, principal = %account.client_email, "exchanging service account assertion");
        let res = self
            .http
            .post(&account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|err| GenerateError::upstream(None, format!("failed to reach token endpoint: {err}")))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "token exchange rejected");
            return Err(GenerateError::upstream(
                Some(status.as_u16()),
                format!("token exchange failed: {body}"),
            ));
        }

        let payload: TokenResponse = res
            .json()
            .await
            .map_err(|err| GenerateError::upstream(None, format!("invalid token response: {err}")))?;
        Ok(CachedToken {
            token: payload.access_token,
            expires_at: now + Duration::seconds(payload.expires_in),
        })
    }
}

/// Signed RS256 JWT asking for a cloud-platform scoped token.
pub fn build_assertion(
    account: &ServiceAccount,
    signer: &EncodingKey,
    now: DateTime<Utc>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: &account.client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: &account.token_uri,
        iat,
        exp: iat + 3600,
    };
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, signer)
}
