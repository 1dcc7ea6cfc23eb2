use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{AuthStateNotifier, Identity, IdentityProvider, Subscription, TokenSource};
use crate::config::{DEFAULT_FIREBASE_TOKEN_URL, FirebaseConfig};
use crate::http_client::http_client;

/// Lifetime assumed when the provider omits `expiresIn`.
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;
/// ID tokens are renewed this long before they actually expire.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds, sent as a string.
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// Body of the secure-token exchange; this endpoint uses snake_case.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
struct Tokens {
    id_token: String,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

impl Tokens {
    fn issued(
        id_token: String,
        refresh_token: Option<String>,
        expires_in: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id_token,
            refresh_token,
            expires_at: now + Duration::seconds(parse_expires_in(expires_in)),
        }
    }

    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.refresh_token.is_some()
            && now + Duration::seconds(REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

fn parse_expires_in(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
}

/// Email/password sign-in against the Firebase identity toolkit REST endpoint.
///
/// The ID token handed to the document store is renewed through the
/// secure-token endpoint once it gets close to expiry.
pub struct FirebaseAuth {
    endpoint: String,
    token_endpoint: String,
    api_key: String,
    tokens: Mutex<Option<Tokens>>,
    notifier: AuthStateNotifier,
}

impl FirebaseAuth {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token_endpoint: DEFAULT_FIREBASE_TOKEN_URL.to_string(),
            api_key: api_key.into(),
            tokens: Mutex::new(None),
            notifier: AuthStateNotifier::new(),
        }
    }

    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn from_config(config: &FirebaseConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        let auth = Self::new(config.auth_url.clone(), api_key);
        Some(auth.with_token_endpoint(config.token_url.clone()))
    }

    fn sign_in_url(&self) -> String {
        format!(
            "{}/accounts:signInWithPassword?key={}",
            self.endpoint,
            urlencoding::encode(&self.api_key)
        )
    }

    fn refresh_url(&self) -> String {
        format!(
            "{}/token?key={}",
            self.token_endpoint,
            urlencoding::encode(&self.api_key)
        )
    }

    fn lock_tokens(&self) -> MutexGuard<'_, Option<Tokens>> {
        self.tokens.lock().expect("firebase tokens lock poisoned")
    }

    pub fn sign_in_with(&self, client: &Client, email: &str, password: &str) -> Result<Identity> {
        let resp = client
            .post(self.sign_in_url())
            .json(&SignInRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .context("sign-in request failed")?;
        let body = read_auth_body(resp, "sign-in")?;

        let parsed = parse_sign_in_response(&body)?;
        let identity = Identity {
            uid: parsed.local_id,
            email: parsed.email,
        };
        *self.lock_tokens() = Some(Tokens::issued(
            parsed.id_token,
            parsed.refresh_token,
            parsed.expires_in.as_deref(),
            Utc::now(),
        ));
        tracing::info!(target: "pitchside::auth", uid = %identity.uid, "firebase sign-in");
        self.notifier.publish(Some(identity.clone()));
        Ok(identity)
    }

    /// Exchanges the stored refresh token for a new ID token and returns it.
    pub fn refresh_with(&self, client: &Client) -> Result<String> {
        let refresh_token = self
            .lock_tokens()
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| anyhow!("no refresh token; sign in again"))?;

        let resp = client
            .post(self.refresh_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .context("token refresh request failed")?;
        let body = read_auth_body(resp, "token refresh")?;
        let parsed = parse_refresh_response(&body)?;

        let mut guard = self.lock_tokens();
        if guard.is_none() {
            return Err(anyhow!("signed out during token refresh"));
        }
        *guard = Some(Tokens::issued(
            parsed.id_token.clone(),
            parsed.refresh_token.or(Some(refresh_token)),
            parsed.expires_in.as_deref(),
            Utc::now(),
        ));
        tracing::debug!(target: "pitchside::auth", "id token refreshed");
        Ok(parsed.id_token)
    }
}

fn read_auth_body(resp: reqwest::blocking::Response, what: &str) -> Result<String> {
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        let reason = parse_error_message(&body).unwrap_or_else(|| status.to_string());
        return Err(anyhow!("{what} failed: {reason}"));
    }
    Ok(body)
}

pub fn parse_sign_in_response(raw: &str) -> Result<SignInResponse> {
    serde_json::from_str(raw.trim()).context("invalid sign-in response")
}

pub fn parse_refresh_response(raw: &str) -> Result<RefreshResponse> {
    serde_json::from_str(raw.trim()).context("invalid token refresh response")
}

/// Extracts the provider's error code (e.g. `INVALID_PASSWORD`) from a failure body.
pub fn parse_error_message(raw: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(raw.trim())
        .ok()
        .map(|e| e.error.message)
        .filter(|m| !m.is_empty())
}

impl IdentityProvider for FirebaseAuth {
    fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        self.sign_in_with(http_client()?, email, password)
    }

    fn sign_out(&self) -> Result<()> {
        *self.lock_tokens() = None;
        tracing::info!(target: "pitchside::auth", "firebase sign-out");
        self.notifier.publish(None);
        Ok(())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.notifier.current()
    }

    fn subscribe(&self) -> Subscription {
        self.notifier.subscribe()
    }
}

impl TokenSource for FirebaseAuth {
    /// Renews a token that is about to expire. A failed renewal hands back the
    /// old token so the caller sees the provider's rejection.
    fn id_token(&self) -> Option<String> {
        let (current, stale) = {
            let guard = self.lock_tokens();
            let tokens = guard.as_ref()?;
            (tokens.id_token.clone(), tokens.needs_refresh(Utc::now()))
        };
        if !stale {
            return Some(current);
        }
        match http_client().and_then(|client| self.refresh_with(client)) {
            Ok(fresh) => Some(fresh),
            Err(err) => {
                tracing::warn!(
                    target: "pitchside::auth",
                    error = %format!("{err:#}"),
                    "id token refresh failed"
                );
                Some(current)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_is_lifted_from_envelope() {
        let raw = r#"{"error":{"code":400,"message":"INVALID_PASSWORD","errors":[]}}"#;
        assert_eq!(parse_error_message(raw).as_deref(), Some("INVALID_PASSWORD"));
        assert_eq!(parse_error_message("<html>"), None);
    }

    #[test]
    fn sign_in_url_carries_key() {
        let auth = FirebaseAuth::new("http://localhost:9099/identitytoolkit/v1/", "k 1");
        assert_eq!(
            auth.sign_in_url(),
            "http://localhost:9099/identitytoolkit/v1/accounts:signInWithPassword?key=k%201"
        );
    }

    #[test]
    fn refresh_url_uses_token_endpoint() {
        let auth = FirebaseAuth::new("http://localhost:9099/v1", "k")
            .with_token_endpoint("http://localhost:9099/securetoken/v1/");
        assert_eq!(auth.refresh_url(), "http://localhost:9099/securetoken/v1/token?key=k");
    }

    #[test]
    fn token_is_stale_inside_the_margin() {
        let now = Utc::now();
        let tokens = Tokens::issued("id".into(), Some("r".into()), Some("3600"), now);
        assert!(!tokens.needs_refresh(now));
        assert!(!tokens.needs_refresh(now + Duration::seconds(3600 - REFRESH_MARGIN_SECS - 1)));
        assert!(tokens.needs_refresh(now + Duration::seconds(3600 - REFRESH_MARGIN_SECS)));
        assert!(tokens.needs_refresh(now + Duration::seconds(7200)));
    }

    #[test]
    fn token_without_refresh_token_is_never_refreshed() {
        let now = Utc::now();
        let tokens = Tokens::issued("id".into(), None, Some("10"), now);
        assert!(!tokens.needs_refresh(now + Duration::seconds(3600)));
    }

    #[test]
    fn expires_in_falls_back_to_an_hour() {
        assert_eq!(parse_expires_in(Some(" 1800 ")), 1800);
        assert_eq!(parse_expires_in(Some("soon")), DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(parse_expires_in(Some("0")), DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(parse_expires_in(None), DEFAULT_TOKEN_TTL_SECS);
    }
}
