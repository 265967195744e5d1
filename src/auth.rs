//! Service-account authentication for the Google APIs.
//!
//! Signs an RS256 JWT assertion with the service account's private key and
//! exchanges it for a short-lived bearer token (OAuth2 JWT-bearer grant).
//! Tokens are cached until shortly before they expire.

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::{Result, SyncError};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token server's stated expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    config::GOOGLE_TOKEN_URI.to_string()
}

// ---------------------------------------------------------------------------
// ServiceAccountKey — The downloaded credentials file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    /// Load a service-account key file. A missing file is a credentials error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SyncError::Credentials(format!(
                "credentials file {} not found",
                path.display()
            )));
        }
        let contents = fs::read_to_string(path).map_err(|e| {
            SyncError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SyncError::Credentials(format!("malformed service-account key: {}", e)))
    }
}

// ---------------------------------------------------------------------------
// TokenProvider
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: i64,
}

/// Mints and caches bearer tokens for one service account.
pub struct TokenProvider {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    scope: String,
    client: Client,
    cached: RefCell<Option<CachedToken>>,
}

impl TokenProvider {
    /// Parse the key's PEM up front so a bad key fails at start-up.
    pub fn new(key: ServiceAccountKey, scopes: &[&str], client: Client) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| SyncError::Credentials(format!("invalid private key: {}", e)))?;
        Ok(Self {
            key,
            signing_key,
            scope: scopes.join(" "),
            client,
            cached: RefCell::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// A valid access token, fetching a new one if the cache is empty or stale.
    pub fn access_token(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        if let Some(token) = self.cached.borrow().as_ref() {
            if token.expires_at - EXPIRY_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let token = self.request_token(now)?;
        let value = token.value.clone();
        *self.cached.borrow_mut() = Some(token);
        Ok(value)
    }

    /// Forget the cached token, e.g. after the API rejected it.
    pub fn invalidate(&self) {
        self.cached.borrow_mut().take();
    }

    fn assertion(&self, now: i64) -> Result<String> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        Ok(jsonwebtoken::encode(&header, &claims, &self.signing_key)?)
    }

    fn request_token(&self, now: i64) -> Result<CachedToken> {
        let assertion = self.assertion(now)?;
        log::debug!("Requesting access token for {}", self.key.client_email);

        let resp = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(SyncError::Credentials(format!(
                "token exchange failed ({}): {}",
                status,
                body.trim()
            )));
        }

        let token: TokenResponse = resp.json()?;
        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + token.expires_in,
        })
    }
}
