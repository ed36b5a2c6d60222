//! Client facade: the single authenticated entry point the engine drives.
//!
//! Composes [`session::SessionManager`] and [`transport::RestExecutor`]
//! into typed moderation operations. Neither the session manager nor this
//! facade owns the other — both hold their own [`transport::RestExecutor`]
//! handle, which keeps construction acyclic.

mod client;
mod error;
mod types;

pub use client::{Client, ClientConfig};
pub use error::{Error, Result};
pub use types::{AccountSubject, EmitResponse, ModerationEvent, ProfileView, RecordRef, ReportResponse};

#[cfg(test)]
mod tests {
    use super::*;
    use session::Credentials;
    use std::time::Duration;

    fn session_body() -> String {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, now + 3600));
        let jwt = format!("{header}.{payload}.sig");
        serde_json::json!({
            "accessJwt": jwt,
            "refreshJwt": "refresh-token",
            "did": "did:plc:operator",
            "handle": "operator.bsky.social",
        })
        .to_string()
    }

    #[tokio::test]
    async fn not_ready_before_connect() {
        let server = mockito::Server::new_async().await;
        let client = Client::new(
            reqwest::Client::new(),
            ClientConfig {
                base_url: server.url(),
                service_did: "did:plc:labeler".into(),
                operator_did: "did:plc:operator".into(),
                credentials: Credentials {
                    identifier: "x".into(),
                    password: common::Secret::new("y".into()),
                },
                refresh_buffer: Duration::from_secs(60),
                use_token: true,
            },
        );
        assert!(!client.is_ready());
        let err = client
            .label_account("did:plc:target", vec!["spam".into()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotReady));
    }

    #[tokio::test]
    async fn label_account_emits_event_after_connect() {
        let mut server = mockito::Server::new_async().await;
        let _session = server
            .mock("POST", "/xrpc/com.atproto.server.createSession")
            .with_status(200)
            .with_body(session_body())
            .create_async()
            .await;
        let _emit = server
            .mock("POST", "/xrpc/tools.ozone.moderation.emitEvent")
            .match_header("atproto-proxy", "did:plc:labeler#atproto_labeler")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "id": 1,
                    "createdAt": "2026-01-01T00:00:00Z",
                    "createdBy": "did:plc:operator",
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = Client::new(
            reqwest::Client::new(),
            ClientConfig {
                base_url: server.url(),
                service_did: "did:plc:labeler".into(),
                operator_did: "did:plc:operator".into(),
                credentials: Credentials {
                    identifier: "x".into(),
                    password: common::Secret::new("y".into()),
                },
                refresh_buffer: Duration::from_secs(60),
                use_token: true,
            },
        );
        client.connect().await.unwrap();
        assert!(client.is_ready());

        let response = client
            .label_account("did:plc:target", vec!["spam".into()], Some("auto".into()))
            .await
            .unwrap();
        assert_eq!(response.id, 1);
    }
}
