//! Trigger types for the deploy pipeline.
//!
//! An [`InboundTrigger`] is the raw notification as handed over by the
//! transport layer (headers of interest plus the unparsed body). Validation
//! turns it into a [`TriggerEvent`], the only two facts the pipeline needs:
//! where to fetch from and which exact revision to build.

use serde::{Deserialize, Serialize};

/// A raw inbound notification, as delivered by whatever transport fronts the
/// service.
///
/// The transport contract is deliberately narrow: the event name (e.g. the
/// `X-GitHub-Event` header), the signature header value if present, and the
/// body bytes exactly as received. Signature verification happens over the
/// raw bytes, so the body must not be re-serialized on the way in.
#[derive(Debug, Clone)]
pub struct InboundTrigger {
    /// Event name from the delivery headers (e.g. "push", "ping")
    pub event: String,

    /// Signature header value (e.g. "sha256=<hex>"), if the sender signed
    pub signature: Option<String>,

    /// Raw payload bytes
    pub body: Vec<u8>,
}

impl InboundTrigger {
    /// Convenience constructor for a signed trigger
    pub fn new(event: impl Into<String>, signature: Option<String>, body: Vec<u8>) -> Self {
        Self {
            event: event.into(),
            signature,
            body,
        }
    }
}

/// The validated result of an inbound notification.
///
/// Created per trigger, consumed by one pipeline run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Fetchable repository address (https clone URL)
    pub clone_url: String,

    /// Exact commit identifier that triggered the deploy (never a ref name)
    pub revision: String,
}

/// Push payload shape, the subset of fields the validator reads.
///
/// Field names follow the webhook wire format; everything else in the
/// payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    /// Full ref that was pushed (e.g. "refs/heads/main")
    #[serde(rename = "ref")]
    pub git_ref: String,

    /// True when the push deleted the ref
    #[serde(default)]
    pub deleted: bool,

    /// The new head commit; absent for deletions
    pub head_commit: Option<HeadCommit>,

    /// The repository the push landed in
    pub repository: Repository,
}

/// Head commit of a push
#[derive(Debug, Clone, Deserialize)]
pub struct HeadCommit {
    /// Full commit hash
    pub id: String,
}

/// Repository block of a push payload
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// HTTPS clone URL
    pub clone_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUSH_JSON: &str = r#"{
        "ref": "refs/heads/main",
        "deleted": false,
        "head_commit": { "id": "a1b2c3d4e5f60718293a4b5c6d7e8f9011223344" },
        "repository": { "clone_url": "https://github.com/acme/widget.git" }
    }"#;

    #[test]
    fn test_push_payload_parsing() {
        let payload: PushPayload = serde_json::from_str(PUSH_JSON).unwrap();

        assert_eq!(payload.git_ref, "refs/heads/main");
        assert!(!payload.deleted);
        assert_eq!(
            payload.head_commit.unwrap().id,
            "a1b2c3d4e5f60718293a4b5c6d7e8f9011223344"
        );
        assert_eq!(
            payload.repository.clone_url,
            "https://github.com/acme/widget.git"
        );
    }

    #[test]
    fn test_deleted_push_without_head_commit() {
        let json = r#"{
            "ref": "refs/heads/main",
            "deleted": true,
            "head_commit": null,
            "repository": { "clone_url": "https://github.com/acme/widget.git" }
        }"#;

        let payload: PushPayload = serde_json::from_str(json).unwrap();
        assert!(payload.deleted);
        assert!(payload.head_commit.is_none());
    }

    #[test]
    fn test_deleted_defaults_to_false() {
        let json = r#"{
            "ref": "refs/heads/main",
            "head_commit": { "id": "abc" },
            "repository": { "clone_url": "https://example.com/r.git" }
        }"#;

        let payload: PushPayload = serde_json::from_str(json).unwrap();
        assert!(!payload.deleted);
    }
}
