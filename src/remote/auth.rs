//! Service-account credentials and OAuth access tokens.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::StoreError;

const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// The parts of a service-account key file we use.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
    pub project_id: Option<String>,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccount {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("credential file not found: {}", path.display());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read credential file {}", path.display()))?;
        let account: ServiceAccount = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse credential file {}", path.display()))?;
        if let Some(kind) = account.account_type.as_deref() {
            if kind != "service_account" {
                bail!(
                    "credential file {} is of type `{}`, expected `service_account`",
                    path.display(),
                    kind
                );
            }
        }
        Ok(account)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchange a signed assertion for a bearer token.
pub fn fetch_access_token(
    http: &reqwest::blocking::Client,
    account: &ServiceAccount,
) -> Result<String, StoreError> {
    let assertion = sign_assertion(account, OffsetDateTime::now_utc().unix_timestamp())?;

    let response = http
        .post(&account.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(StoreError::Auth(format!("token endpoint returned {status}: {body}")));
    }

    let token: TokenResponse = response
        .json()
        .map_err(|err| StoreError::Auth(format!("malformed token response: {err}")))?;
    tracing::debug!(client = %account.client_email, "obtained access token");
    Ok(token.access_token)
}

fn sign_assertion(account: &ServiceAccount, now: i64) -> Result<String, StoreError> {
    let claims = Claims {
        iss: &account.client_email,
        scope: DATASTORE_SCOPE,
        aud: &account.token_uri,
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };
    let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
        .map_err(|err| StoreError::Auth(format!("invalid private key: {err}")))?;
    encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|err| StoreError::Auth(format!("failed to sign assertion: {err}")))
}
