//! Typed request/response shapes for the AT Protocol moderation surface
//!
//! AT Protocol lexicons discriminate union members with a `$type` field,
//! which is not a valid Rust identifier. Types here either rename a field
//! to `$type` via `#[serde(rename = "$type")]`, or — for the moderation
//! event union, whose variants carry different payload shapes — build the
//! tagged JSON value directly rather than force it through one struct.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A moderation subject referencing an account by DID.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSubject {
    #[serde(rename = "$type")]
    pub type_: &'static str,
    pub did: String,
}

impl AccountSubject {
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            type_: "com.atproto.admin.defs#repoRef",
            did: did.into(),
        }
    }
}

/// One moderation decision to emit via `tools.ozone.moderation.emitEvent`.
#[derive(Debug, Clone)]
pub enum ModerationEvent {
    Label {
        create_label_vals: Vec<String>,
        negate_label_vals: Vec<String>,
        comment: Option<String>,
    },
    Acknowledge {
        comment: Option<String>,
    },
    Tag {
        add: Vec<String>,
        remove: Vec<String>,
        comment: Option<String>,
    },
    Comment {
        comment: String,
        sticky: bool,
    },
}

impl ModerationEvent {
    pub fn to_value(&self) -> Value {
        match self {
            ModerationEvent::Label {
                create_label_vals,
                negate_label_vals,
                comment,
            } => json!({
                "$type": "tools.ozone.moderation.defs#modEventLabel",
                "createLabelVals": create_label_vals,
                "negateLabelVals": negate_label_vals,
                "comment": comment,
            }),
            ModerationEvent::Acknowledge { comment } => json!({
                "$type": "tools.ozone.moderation.defs#modEventAcknowledge",
                "comment": comment,
            }),
            ModerationEvent::Tag { add, remove, comment } => json!({
                "$type": "tools.ozone.moderation.defs#modEventTag",
                "add": add,
                "remove": remove,
                "comment": comment,
            }),
            ModerationEvent::Comment { comment, sticky } => json!({
                "$type": "tools.ozone.moderation.defs#modEventComment",
                "comment": comment,
                "sticky": sticky,
            }),
        }
    }
}

/// Response envelope from `emitEvent`: just enough to confirm the server
/// accepted the event.
#[derive(Debug, Clone, Deserialize)]
pub struct EmitResponse {
    pub id: i64,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "createdBy")]
    pub created_by: String,
}

/// Response envelope from `com.atproto.moderation.createReport`. Distinct
/// from [`EmitResponse`] — the report surface names its actor field
/// `reportedBy`, not `createdBy` — and its fields are optional since
/// callers only care that the request was accepted, not the shape of
/// the body.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportResponse {
    pub id: Option<i64>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "reportedBy")]
    pub reported_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileView {
    pub did: String,
    pub handle: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordRef {
    pub uri: String,
    pub cid: String,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_subject_uses_repo_ref_type() {
        let subject = AccountSubject::new("did:plc:abc");
        let value = serde_json::to_value(&subject).unwrap();
        assert_eq!(value["$type"], "com.atproto.admin.defs#repoRef");
        assert_eq!(value["did"], "did:plc:abc");
    }

    #[test]
    fn label_event_serializes_expected_shape() {
        let event = ModerationEvent::Label {
            create_label_vals: vec!["spam".into()],
            negate_label_vals: vec![],
            comment: Some("auto-flagged".into()),
        };
        let value = event.to_value();
        assert_eq!(value["$type"], "tools.ozone.moderation.defs#modEventLabel");
        assert_eq!(value["createLabelVals"][0], "spam");
    }

    #[test]
    fn report_response_parses_reported_by_field() {
        let body = serde_json::json!({
            "id": 42,
            "createdAt": "2026-01-01T00:00:00Z",
            "reportedBy": "did:plc:operator",
        });
        let response: ReportResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.id, Some(42));
        assert_eq!(response.reported_by.as_deref(), Some("did:plc:operator"));
    }

    #[test]
    fn report_response_tolerates_missing_fields() {
        let response: ReportResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(response.id.is_none());
        assert!(response.reported_by.is_none());
    }

    #[test]
    fn comment_event_carries_sticky_flag() {
        let event = ModerationEvent::Comment {
            comment: "note".into(),
            sticky: true,
        };
        let value = event.to_value();
        assert_eq!(value["sticky"], true);
    }
}
