//! Uniform HTTP execution policy for AT Protocol calls
//!
//! One policy is applied to every outbound call regardless of which
//! component issues it (session bootstrap, moderation client, redirect
//! follower): attach the bearer token and labeler headers if requested,
//! retry a bounded number of times on a transient connection-EOF fault,
//! and surface anything else (including non-2xx statuses) as an error.
//!
//! Response bodies are deserialized with `serde_json`; callers whose
//! payloads carry a `$type` discriminator field should name that Rust
//! field `#[serde(rename = "$type")]` rather than expecting this executor
//! to remap it generically.

use std::time::Instant;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Number of times a transient read-EOF is retried before surfacing.
const MAX_RETRIES: u32 = 5;

/// A single outbound request, fully described before dispatch.
pub struct RequestSpec<'a> {
    pub method: Method,
    pub path: &'a str,
    pub body: Option<Value>,
    pub bearer: Option<&'a str>,
    pub extra_headers: Vec<(&'static str, String)>,
    /// When true, the request/response body is omitted from log lines
    /// (credential exchange, token refresh).
    pub no_log_body: bool,
}

impl<'a> RequestSpec<'a> {
    pub fn get(path: &'a str) -> Self {
        Self {
            method: Method::GET,
            path,
            body: None,
            bearer: None,
            extra_headers: Vec::new(),
            no_log_body: false,
        }
    }

    pub fn post(path: &'a str, body: impl Serialize) -> Self {
        Self {
            method: Method::POST,
            path,
            body: Some(serde_json::to_value(body).expect("request body must serialize")),
            bearer: None,
            extra_headers: Vec::new(),
            no_log_body: false,
        }
    }

    pub fn bearer(mut self, token: &'a str) -> Self {
        self.bearer = Some(token);
        self
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.extra_headers.push((name, value.into()));
        self
    }

    pub fn no_log_body(mut self) -> Self {
        self.no_log_body = true;
        self
    }
}

/// Shared HTTP handle used by both the session manager and the moderation
/// client. Holding this separately from both is what breaks the
/// session-manager/client-facade reference cycle: neither owns the other,
/// both borrow this.
#[derive(Clone)]
pub struct RestExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl RestExecutor {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Execute one request under the uniform retry/logging policy,
    /// returning the parsed JSON body.
    pub async fn execute(&self, spec: RequestSpec<'_>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, spec.path);
        let mut attempt = 0u32;

        loop {
            let started = Instant::now();
            let mut builder = self.client.request(spec.method.clone(), &url);
            if let Some(token) = spec.bearer {
                builder = builder.bearer_auth(token);
            }
            if spec.method == Method::POST {
                builder = builder.header("Content-Type", "application/json");
            }
            for (name, value) in &spec.extra_headers {
                builder = builder.header(*name, value);
            }
            if let Some(body) = &spec.body {
                builder = builder.json(body);
            }

            let result = builder.send().await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    let elapsed = started.elapsed();
                    let text = response
                        .text()
                        .await
                        .map_err(|e| Error::Http(format!("failed reading response body: {e}")))?;

                    if !status.is_success() {
                        warn!(
                            path = spec.path,
                            status = status.as_u16(),
                            elapsed_ms = elapsed.as_millis() as u64,
                            body = if spec.no_log_body { "<redacted>" } else { &text },
                            "request returned non-success status"
                        );
                        return Err(Error::Status {
                            status: status.as_u16(),
                            body: text,
                        });
                    }

                    debug!(
                        path = spec.path,
                        status = status.as_u16(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "request succeeded"
                    );

                    if text.is_empty() {
                        return Ok(Value::Null);
                    }
                    return serde_json::from_str(&text)
                        .map_err(|e| Error::Json(format!("{e}: body was {text}")));
                }
                Err(e) if is_transient_eof(&e) && attempt < MAX_RETRIES => {
                    attempt += 1;
                    warn!(
                        path = spec.path,
                        attempt,
                        max_retries = MAX_RETRIES,
                        error = %e,
                        "transient connection fault, retrying"
                    );
                    continue;
                }
                Err(e) => {
                    return Err(Error::Http(format!("{} failed: {e}", spec.path)));
                }
            }
        }
    }
}

/// Classify a reqwest error as a transient connection-EOF fault worth
/// retrying. Covers connection resets and the "connection closed before
/// message completed" class of errors that `hyper` surfaces for
/// keep-alive connections that raced a server-side close. Connection
/// failures (refused, DNS) and timeouts are not read-EOF and are
/// deliberately excluded — everything but this narrow class is fatal and
/// propagates on the first attempt.
fn is_transient_eof(err: &reqwest::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("eof") || msg.contains("connection closed") || msg.contains("connection reset")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_get_parses_json_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"hello":"world"}"#)
            .create_async()
            .await;

        let executor = RestExecutor::new(reqwest::Client::new(), server.url());
        let value = executor.execute(RequestSpec::get("/ok")).await.unwrap();
        assert_eq!(value["hello"], "world");
    }

    #[tokio::test]
    async fn non_success_status_surfaces_as_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/fail")
            .with_status(400)
            .with_body(r#"{"error":"InvalidRequest","message":"bad input"}"#)
            .create_async()
            .await;

        let executor = RestExecutor::new(reqwest::Client::new(), server.url());
        let err = executor
            .execute(RequestSpec::post("/fail", serde_json::json!({})))
            .await
            .unwrap_err();

        match err {
            Error::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("InvalidRequest"));
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bearer_token_is_attached() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/secure")
            .match_header("authorization", "Bearer tok_abc")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let executor = RestExecutor::new(reqwest::Client::new(), server.url());
        let result = executor
            .execute(RequestSpec::get("/secure").bearer("tok_abc"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn empty_body_deserializes_to_null() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/empty")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let executor = RestExecutor::new(reqwest::Client::new(), server.url());
        let value = executor.execute(RequestSpec::get("/empty")).await.unwrap();
        assert!(value.is_null());
    }
}
