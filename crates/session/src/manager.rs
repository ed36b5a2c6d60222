//! Session state machine: unauth → authed → (refresh ⇄ authed) → unauth

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::Secret;
use reqwest::Method;
use serde::Deserialize;
use tracing::{info, warn};
use transport::{RequestSpec, RestExecutor};

use crate::error::{Error, Result};
use crate::jwt;

/// Login identity for `com.atproto.server.createSession`.
#[derive(Clone)]
pub struct Credentials {
    pub identifier: String,
    pub password: Secret<String>,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(rename = "accessJwt")]
    access_jwt: String,
    #[serde(rename = "refreshJwt")]
    refresh_jwt: String,
    did: String,
    handle: String,
}

#[derive(Clone)]
struct Tokens {
    access: String,
    refresh: String,
    access_exp: i64,
    did: String,
    handle: String,
}

enum SessionState {
    Unauth,
    Authed(Tokens),
}

/// Owns the bearer tokens for one AT Protocol identity and keeps them
/// fresh. Does not own the HTTP client or the moderation client facade —
/// both borrow the same [`RestExecutor`] to avoid a reference cycle.
pub struct SessionManager {
    transport: RestExecutor,
    state: Mutex<SessionState>,
    refresh_buffer: Duration,
}

impl SessionManager {
    pub fn new(transport: RestExecutor, refresh_buffer: Duration) -> Self {
        Self {
            transport,
            state: Mutex::new(SessionState::Unauth),
            refresh_buffer,
        }
    }

    /// Establish a new session with the PDS via `createSession`.
    pub async fn connect(&self, credentials: &Credentials) -> Result<()> {
        let body = serde_json::json!({
            "identifier": credentials.identifier,
            "password": credentials.password.expose(),
        });

        let response = self
            .transport
            .execute(
                RequestSpec {
                    method: Method::POST,
                    path: "/xrpc/com.atproto.server.createSession",
                    body: Some(body),
                    bearer: None,
                    extra_headers: Vec::new(),
                    no_log_body: true,
                },
            )
            .await
            .map_err(classify_connect_error)?;

        let parsed: SessionResponse = serde_json::from_value(response)
            .map_err(|e| Error::SessionExchange(format!("unexpected createSession shape: {e}")))?;

        let access_exp = jwt::decode_expiry(&parsed.access_jwt)?;

        info!(did = %parsed.did, handle = %parsed.handle, "session established");
        metrics::counter!("session_refresh_total", "outcome" => "connect").increment(1);

        *self.state.lock().expect("session lock poisoned") = SessionState::Authed(Tokens {
            access: parsed.access_jwt,
            refresh: parsed.refresh_jwt,
            access_exp,
            did: parsed.did,
            handle: parsed.handle,
        });

        Ok(())
    }

    /// Refresh the access token if it is expired or within the configured
    /// buffer of expiring. Called before every authenticated write.
    ///
    /// On a server-reported invalid/expired refresh token, this does not
    /// propagate the error — it reconnects from scratch using the stored
    /// credentials and only fails if that reconnect itself fails.
    pub async fn check_refresh(&self, credentials: &Credentials) -> Result<()> {
        let (refresh_token, needs_refresh) = {
            let state = self.state.lock().expect("session lock poisoned");
            match &*state {
                SessionState::Unauth => return Err(Error::NotConnected),
                SessionState::Authed(tokens) => {
                    (tokens.refresh.clone(), self.is_near_expiry(tokens.access_exp))
                }
            }
        };

        if !needs_refresh {
            return Ok(());
        }

        let response = self
            .transport
            .execute(
                RequestSpec {
                    method: Method::POST,
                    path: "/xrpc/com.atproto.server.refreshSession",
                    body: None,
                    bearer: Some(&refresh_token),
                    extra_headers: Vec::new(),
                    no_log_body: true,
                },
            )
            .await;

        match response {
            Ok(value) => {
                let parsed: SessionResponse = serde_json::from_value(value).map_err(|e| {
                    Error::SessionExchange(format!("unexpected refreshSession shape: {e}"))
                })?;
                let access_exp = jwt::decode_expiry(&parsed.access_jwt)?;
                info!(did = %parsed.did, "session token refreshed");
                metrics::counter!("session_refresh_total", "outcome" => "refresh").increment(1);
                *self.state.lock().expect("session lock poisoned") =
                    SessionState::Authed(Tokens {
                        access: parsed.access_jwt,
                        refresh: parsed.refresh_jwt,
                        access_exp,
                        did: parsed.did,
                        handle: parsed.handle,
                    });
                Ok(())
            }
            Err(e) if is_invalid_token(&e) => {
                warn!("refresh token rejected, reconnecting from credentials");
                metrics::counter!("session_refresh_total", "outcome" => "reconnect").increment(1);
                self.connect(credentials).await
            }
            Err(e) => {
                metrics::counter!("session_refresh_total", "outcome" => "failed").increment(1);
                Err(classify_connect_error(e))
            }
        }
    }

    fn is_near_expiry(&self, access_exp: i64) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        now + self.refresh_buffer.as_secs() as i64 >= access_exp
    }

    /// Current access token, for use as a bearer on authenticated calls.
    pub fn access_token(&self) -> Result<String> {
        match &*self.state.lock().expect("session lock poisoned") {
            SessionState::Unauth => Err(Error::NotConnected),
            SessionState::Authed(tokens) => Ok(tokens.access.clone()),
        }
    }

    /// Current refresh token. Used only by `check_refresh`.
    pub fn refresh_token(&self) -> Result<String> {
        match &*self.state.lock().expect("session lock poisoned") {
            SessionState::Unauth => Err(Error::NotConnected),
            SessionState::Authed(tokens) => Ok(tokens.refresh.clone()),
        }
    }

    /// DID of the currently authenticated identity.
    pub fn did(&self) -> Result<String> {
        match &*self.state.lock().expect("session lock poisoned") {
            SessionState::Unauth => Err(Error::NotConnected),
            SessionState::Authed(tokens) => Ok(tokens.did.clone()),
        }
    }

    /// Whether `connect` has completed successfully.
    pub fn is_ready(&self) -> bool {
        matches!(
            &*self.state.lock().expect("session lock poisoned"),
            SessionState::Authed(_)
        )
    }
}

fn classify_connect_error(err: transport::Error) -> Error {
    match err {
        transport::Error::Status { status, body } if status == 401 || status == 400 => {
            Error::InvalidCredentials(body)
        }
        other => Error::Http(other.to_string()),
    }
}

/// True if the error body names one of the AT Protocol token-invalidity
/// errors returned by `refreshSession`.
fn is_invalid_token(err: &transport::Error) -> bool {
    if let transport::Error::Status { body, .. } = err {
        let lower = body.to_lowercase();
        return lower.contains("expiredtoken") || lower.contains("invalidtoken") || lower.contains("invalid token");
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_body(access_exp_in_secs: i64) -> String {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, now + access_exp_in_secs));
        let jwt = format!("{header}.{payload}.sig");
        serde_json::json!({
            "accessJwt": jwt,
            "refreshJwt": "refresh-token-value",
            "did": "did:plc:test123",
            "handle": "test.bsky.social",
        })
        .to_string()
    }

    #[tokio::test]
    async fn connect_establishes_session() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/xrpc/com.atproto.server.createSession")
            .with_status(200)
            .with_body(session_body(3600))
            .create_async()
            .await;

        let transport = RestExecutor::new(reqwest::Client::new(), server.url());
        let manager = SessionManager::new(transport, Duration::from_secs(60));
        let creds = Credentials {
            identifier: "test.bsky.social".into(),
            password: Secret::new("hunter2".into()),
        };

        manager.connect(&creds).await.unwrap();
        assert!(manager.is_ready());
        assert_eq!(manager.did().unwrap(), "did:plc:test123");
    }

    #[tokio::test]
    async fn check_refresh_skips_when_token_is_fresh() {
        let mut server = mockito::Server::new_async().await;
        let _session = server
            .mock("POST", "/xrpc/com.atproto.server.createSession")
            .with_status(200)
            .with_body(session_body(3600))
            .create_async()
            .await;
        // No mock for refreshSession: if check_refresh calls it, the test fails.

        let transport = RestExecutor::new(reqwest::Client::new(), server.url());
        let manager = SessionManager::new(transport, Duration::from_secs(60));
        let creds = Credentials {
            identifier: "test.bsky.social".into(),
            password: Secret::new("hunter2".into()),
        };
        manager.connect(&creds).await.unwrap();

        manager.check_refresh(&creds).await.unwrap();
    }

    #[tokio::test]
    async fn check_refresh_rotates_tokens_when_near_expiry() {
        let mut server = mockito::Server::new_async().await;
        let _session = server
            .mock("POST", "/xrpc/com.atproto.server.createSession")
            .with_status(200)
            .with_body(session_body(30))
            .create_async()
            .await;
        let _refresh = server
            .mock("POST", "/xrpc/com.atproto.server.refreshSession")
            .with_status(200)
            .with_body(session_body(3600))
            .create_async()
            .await;

        let transport = RestExecutor::new(reqwest::Client::new(), server.url());
        let manager = SessionManager::new(transport, Duration::from_secs(60));
        let creds = Credentials {
            identifier: "test.bsky.social".into(),
            password: Secret::new("hunter2".into()),
        };
        manager.connect(&creds).await.unwrap();

        manager.check_refresh(&creds).await.unwrap();
        assert!(manager.is_ready());
    }

    #[tokio::test]
    async fn check_refresh_reconnects_on_invalid_token() {
        let mut server = mockito::Server::new_async().await;
        let session_mock = server
            .mock("POST", "/xrpc/com.atproto.server.createSession")
            .with_status(200)
            .with_body(session_body(30))
            .expect(2)
            .create_async()
            .await;
        let _refresh = server
            .mock("POST", "/xrpc/com.atproto.server.refreshSession")
            .with_status(400)
            .with_body(r#"{"error":"ExpiredToken","message":"Token has expired"}"#)
            .create_async()
            .await;

        let transport = RestExecutor::new(reqwest::Client::new(), server.url());
        let manager = SessionManager::new(transport, Duration::from_secs(60));
        let creds = Credentials {
            identifier: "test.bsky.social".into(),
            password: Secret::new("hunter2".into()),
        };
        manager.connect(&creds).await.unwrap();

        manager.check_refresh(&creds).await.unwrap();
        assert!(manager.is_ready());
        session_mock.assert_async().await;
    }

    #[tokio::test]
    async fn access_token_before_connect_is_not_connected() {
        let transport = RestExecutor::new(reqwest::Client::new(), "http://localhost".to_string());
        let manager = SessionManager::new(transport, Duration::from_secs(60));
        assert!(matches!(manager.access_token(), Err(Error::NotConnected)));
    }
}
