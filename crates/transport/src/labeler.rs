//! Labeler routing headers
//!
//! Moderation operations are routed to a specific labeler service via two
//! headers: `Atproto-Accept-Labelers` tells the PDS which labelers' views to
//! include, and `Atproto-Proxy` routes the request itself to the labeler's
//! moderation lexicon (`tools.ozone.moderation` / `com.atproto.moderation`).

/// Header values identifying the target labeler/moderation service.
#[derive(Debug, Clone)]
pub struct LabelerHeaders {
    service_did: String,
}

impl LabelerHeaders {
    pub fn new(service_did: impl Into<String>) -> Self {
        Self {
            service_did: service_did.into(),
        }
    }

    /// `Atproto-Accept-Labelers` value: the labeler DID with redact=false.
    pub fn accept_labelers(&self) -> String {
        format!("{}; redact=false", self.service_did)
    }

    /// `Atproto-Proxy` value: labeler DID suffixed with the moderation lexicon.
    pub fn proxy(&self) -> String {
        format!("{}#atproto_labeler", self.service_did)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_labelers_includes_redact_false() {
        let h = LabelerHeaders::new("did:plc:abc123");
        assert_eq!(h.accept_labelers(), "did:plc:abc123; redact=false");
    }

    #[test]
    fn proxy_appends_service_suffix() {
        let h = LabelerHeaders::new("did:plc:abc123");
        assert_eq!(h.proxy(), "did:plc:abc123#atproto_labeler");
    }
}
