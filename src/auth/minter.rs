//! Bearer-token minting via the JWT-bearer grant
//!
//! Each turn signs a fresh time-bounded assertion with the service
//! account's RSA key and exchanges it at the identity provider's token
//! endpoint for a short-lived access token. Nothing is cached: one turn,
//! one assertion, one exchange.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::credentials::Credential;
use crate::error::TurnError;

/// Token exchange endpoint of the identity provider.
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// OAuth scope every assertion requests.
const PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Lifetime claimed by each assertion, in seconds.
const ASSERTION_TTL_SECS: i64 = 3600;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Short-lived bearer token scoped to one backend call.
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// The raw bearer value, for the Authorization header.
    pub fn reveal(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Mints an access token for one turn.
#[async_trait]
pub trait TokenMinter: Send + Sync {
    /// Produces a fresh token; assertions are never reused between calls.
    async fn mint(&self, credential: &Credential) -> Result<AccessToken, TurnError>;
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
struct ExchangeResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Production minter: signs an assertion and exchanges it at the token
/// endpoint with a single form-encoded POST.
pub struct JwtBearerMinter {
    client: reqwest::Client,
    token_url: String,
}

impl JwtBearerMinter {
    pub fn new(token_url: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            token_url: token_url.unwrap_or(TOKEN_ENDPOINT).to_string(),
        }
    }

    fn build_assertion(
        &self,
        credential: &Credential,
        now: i64,
    ) -> Result<String, TurnError> {
        let claims = AssertionClaims {
            iss: &credential.issuer,
            scope: PLATFORM_SCOPE,
            aud: &self.token_url,
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        };

        let key = EncodingKey::from_rsa_pem(
            credential.private_key().expose_secret().as_bytes(),
        )
        .map_err(|e| TurnError::Credential(format!("signing key rejected: {e}")))?;

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| TurnError::Credential(format!("failed to sign assertion: {e}")))
    }
}

#[async_trait]
impl TokenMinter for JwtBearerMinter {
    async fn mint(&self, credential: &Credential) -> Result<AccessToken, TurnError> {
        let now = Utc::now().timestamp();
        let assertion = self.build_assertion(credential, now)?;

        let form = [
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ];
        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| TurnError::Transport(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            TurnError::Transport(format!("failed to read token response: {e}"))
        })?;

        if !status.is_success() {
            return Err(exchange_rejection(status.as_u16(), &body));
        }

        match serde_json::from_str::<ExchangeResponse>(&body) {
            Ok(exchange) => Ok(AccessToken::new(exchange.access_token)),
            Err(_) => Err(exchange_rejection(status.as_u16(), &body)),
        }
    }
}

fn exchange_rejection(status: u16, body: &str) -> TurnError {
    match serde_json::from_str::<ExchangeError>(body) {
        Ok(rejection) => TurnError::TokenExchange(
            rejection.error_description.unwrap_or(rejection.error),
        ),
        Err(_) => TurnError::TokenExchange(format!("HTTP {status}: {body}")),
    }
}

/// Minter that never leaves the process.
///
/// Hands out predictable, unique tokens and counts how often it was asked.
#[derive(Debug, Default)]
#[allow(dead_code)] // Constructed in tests
pub struct MockTokenMinter {
    minted: AtomicU64,
}

#[allow(dead_code)] // Used in tests
impl MockTokenMinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens handed out so far.
    pub fn minted(&self) -> u64 {
        self.minted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenMinter for MockTokenMinter {
    async fn mint(&self, credential: &Credential) -> Result<AccessToken, TurnError> {
        let n = self.minted.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken::new(format!(
            "mock-token-{}-{n}",
            credential.project_id
        )))
    }
}
