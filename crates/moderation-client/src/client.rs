//! Typed moderation operations composing the session manager and the
//! shared REST executor.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use session::{Credentials, SessionManager};
use tracing::warn;
use transport::{LabelerHeaders, RequestSpec, RestExecutor};

use crate::error::{Error, Result};
use crate::types::{AccountSubject, EmitResponse, ModerationEvent, ProfileView, RecordRef, ReportResponse};

/// Configuration needed to construct a [`Client`].
pub struct ClientConfig {
    pub base_url: String,
    pub service_did: String,
    pub operator_did: String,
    pub credentials: Credentials,
    pub refresh_buffer: Duration,
    /// Whether read-only calls (`getRecord`, `getProfile(s)`) attach a
    /// bearer token. Some PDS deployments serve these anonymously.
    pub use_token: bool,
}

/// Authenticated entry point composing the session manager and the REST
/// executor, exposing the moderation operations the engine drives.
pub struct Client {
    session: Arc<SessionManager>,
    transport: RestExecutor,
    credentials: Credentials,
    labeler: LabelerHeaders,
    operator_did: String,
    use_token: bool,
}

impl Client {
    pub fn new(http_client: reqwest::Client, config: ClientConfig) -> Self {
        let transport = RestExecutor::new(http_client, config.base_url);
        let session = Arc::new(SessionManager::new(transport.clone(), config.refresh_buffer));
        Self {
            session,
            transport,
            credentials: config.credentials,
            labeler: LabelerHeaders::new(config.service_did),
            operator_did: config.operator_did,
            use_token: config.use_token,
        }
    }

    /// Establish the initial session. Must be called before any other
    /// operation; operations attempted before this return `NotReady`.
    pub async fn connect(&self) -> Result<()> {
        self.session.connect(&self.credentials).await?;
        Ok(())
    }

    /// Whether the client has an established session.
    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    async fn bearer(&self) -> Result<String> {
        if !self.session.is_ready() {
            warn!("moderation operation attempted before session was ready");
            return Err(Error::NotReady);
        }
        self.session.check_refresh(&self.credentials).await?;
        Ok(self.session.access_token()?)
    }

    /// Like [`Self::bearer`], but honors `use_token: false` for the
    /// read-only endpoints that can be served anonymously.
    async fn optional_bearer(&self) -> Result<Option<String>> {
        if !self.use_token {
            return Ok(None);
        }
        self.bearer().await.map(Some)
    }

    async fn emit_event(&self, did: &str, event: ModerationEvent) -> Result<EmitResponse> {
        let token = self.bearer().await?;
        let body = json!({
            "event": event.to_value(),
            "subject": AccountSubject::new(did),
            "createdBy": self.operator_did,
        });

        let value = self
            .transport
            .execute(
                RequestSpec::post("/xrpc/tools.ozone.moderation.emitEvent", body)
                    .bearer(&token)
                    .header("Atproto-Accept-Labelers", self.labeler.accept_labelers())
                    .header("Atproto-Proxy", self.labeler.proxy()),
            )
            .await?;

        serde_json::from_value(value)
            .map_err(|e| Error::MalformedResponse(format!("emitEvent: {e}")))
    }

    pub async fn label_account(
        &self,
        did: &str,
        labels: Vec<String>,
        comment: Option<String>,
    ) -> Result<EmitResponse> {
        self.emit_event(
            did,
            ModerationEvent::Label {
                create_label_vals: labels,
                negate_label_vals: Vec::new(),
                comment,
            },
        )
        .await
    }

    pub async fn acknowledge_subject(&self, did: &str, comment: Option<String>) -> Result<EmitResponse> {
        self.emit_event(did, ModerationEvent::Acknowledge { comment }).await
    }

    pub async fn tag_report_subject(
        &self,
        did: &str,
        add: Vec<String>,
        remove: Vec<String>,
        comment: Option<String>,
    ) -> Result<EmitResponse> {
        self.emit_event(did, ModerationEvent::Tag { add, remove, comment }).await
    }

    pub async fn add_comment_for_subject(&self, did: &str, comment: String, sticky: bool) -> Result<EmitResponse> {
        self.emit_event(did, ModerationEvent::Comment { comment, sticky }).await
    }

    /// `com.atproto.moderation.createReport` — distinct from `emitEvent`:
    /// reports are the public-facing "flag this" surface, not a
    /// moderator-privileged action.
    pub async fn send_report(
        &self,
        did: &str,
        reason_type: &str,
        reason: Option<String>,
    ) -> Result<ReportResponse> {
        let token = self.bearer().await?;
        let body = json!({
            "reasonType": reason_type,
            "reason": reason,
            "subject": AccountSubject::new(did),
        });

        let value = self
            .transport
            .execute(
                RequestSpec::post("/xrpc/com.atproto.moderation.createReport", body)
                    .bearer(&token)
                    .header("Atproto-Accept-Labelers", self.labeler.accept_labelers())
                    .header("Atproto-Proxy", self.labeler.proxy()),
            )
            .await?;

        serde_json::from_value(value)
            .map_err(|e| Error::MalformedResponse(format!("createReport: {e}")))
    }

    pub async fn create_record(&self, repo: &str, collection: &str, record: Value) -> Result<RecordRef> {
        let token = self.bearer().await?;
        let body = json!({ "repo": repo, "collection": collection, "record": record });
        let value = self
            .transport
            .execute(RequestSpec::post("/xrpc/com.atproto.repo.createRecord", body).bearer(&token))
            .await?;
        serde_json::from_value(value).map_err(|e| Error::MalformedResponse(format!("createRecord: {e}")))
    }

    pub async fn put_record(&self, repo: &str, collection: &str, rkey: &str, record: Value) -> Result<RecordRef> {
        let token = self.bearer().await?;
        let body = json!({ "repo": repo, "collection": collection, "rkey": rkey, "record": record });
        let value = self
            .transport
            .execute(RequestSpec::post("/xrpc/com.atproto.repo.putRecord", body).bearer(&token))
            .await?;
        serde_json::from_value(value).map_err(|e| Error::MalformedResponse(format!("putRecord: {e}")))
    }

    pub async fn get_record(&self, repo: &str, collection: &str, rkey: &str) -> Result<RecordRef> {
        let token = self.optional_bearer().await?;
        let path = format!(
            "/xrpc/com.atproto.repo.getRecord?repo={repo}&collection={collection}&rkey={rkey}"
        );
        let mut spec = RequestSpec::get(&path);
        if let Some(token) = &token {
            spec = spec.bearer(token);
        }
        let value = self.transport.execute(spec).await?;
        serde_json::from_value(value).map_err(|e| Error::MalformedResponse(format!("getRecord: {e}")))
    }

    pub async fn get_profile(&self, actor: &str) -> Result<ProfileView> {
        let token = self.optional_bearer().await?;
        let path = format!("/xrpc/app.bsky.actor.getProfile?actor={actor}");
        let mut spec = RequestSpec::get(&path);
        if let Some(token) = &token {
            spec = spec.bearer(token);
        }
        let value = self.transport.execute(spec).await?;
        serde_json::from_value(value).map_err(|e| Error::MalformedResponse(format!("getProfile: {e}")))
    }

    pub async fn get_profiles(&self, actors: &[String]) -> Result<Vec<ProfileView>> {
        let token = self.optional_bearer().await?;
        let query = actors
            .iter()
            .map(|a| format!("actors={a}"))
            .collect::<Vec<_>>()
            .join("&");
        let path = format!("/xrpc/app.bsky.actor.getProfiles?{query}");
        let mut spec = RequestSpec::get(&path);
        if let Some(token) = &token {
            spec = spec.bearer(token);
        }
        let value = self.transport.execute(spec).await?;
        let profiles = value
            .get("profiles")
            .cloned()
            .ok_or_else(|| Error::MalformedResponse("getProfiles: missing profiles field".into()))?;
        serde_json::from_value(profiles).map_err(|e| Error::MalformedResponse(format!("getProfiles: {e}")))
    }
}
