//! Two-layer trigger validation.
//!
//! Layer one is authenticity: the payload signature is an HMAC-SHA256 of the
//! raw body keyed by the shared secret, compared in constant time. Layer two
//! is semantics: the event must be a push to the tracked ref with a live head
//! commit. Both layers are pure functions of the trigger and configuration;
//! no filesystem or network access happens before they pass.
//!
//! The two rejection kinds matter to callers: `NotActionable` is acknowledged
//! quietly (204 at the boundary) while `InvalidTrigger` is a client error.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::{DeployError, InboundTrigger, PushPayload, TriggerEvent};

type HmacSha256 = Hmac<Sha256>;

/// Signature header prefix for HMAC-SHA256
const SIGNATURE_PREFIX: &str = "sha256=";

/// Validate an inbound trigger against the shared secret and tracked ref.
///
/// With an empty secret, signature verification is skipped; this is the
/// manual/CLI path where payloads come from a local file rather than a
/// signed delivery. Any configured secret makes the signature mandatory.
pub fn validate(
    trigger: &InboundTrigger,
    secret: &str,
    tracked_ref: &str,
) -> Result<TriggerEvent, DeployError> {
    if !secret.is_empty() {
        verify_signature(&trigger.body, trigger.signature.as_deref(), secret)?;
    }

    if trigger.event != "push" {
        return Err(DeployError::NotActionable(format!(
            "not a push event: {}",
            trigger.event
        )));
    }

    let payload: PushPayload = serde_json::from_slice(&trigger.body)
        .map_err(|e| DeployError::InvalidTrigger(format!("malformed push payload: {}", e)))?;

    if payload.git_ref != tracked_ref {
        return Err(DeployError::NotActionable(format!(
            "push to untracked ref {}",
            payload.git_ref
        )));
    }

    if payload.deleted {
        return Err(DeployError::NotActionable("ref was deleted".to_string()));
    }

    let head = payload
        .head_commit
        .ok_or_else(|| DeployError::NotActionable("push has no head commit".to_string()))?;

    Ok(TriggerEvent {
        clone_url: payload.repository.clone_url,
        revision: head.id,
    })
}

/// Check the HMAC-SHA256 signature of the raw body.
fn verify_signature(
    body: &[u8],
    signature: Option<&str>,
    secret: &str,
) -> Result<(), DeployError> {
    let signature = signature
        .ok_or_else(|| DeployError::InvalidTrigger("missing signature header".to_string()))?;

    let hex_digest = signature.strip_prefix(SIGNATURE_PREFIX).ok_or_else(|| {
        DeployError::InvalidTrigger(format!(
            "signature header must start with {:?}",
            SIGNATURE_PREFIX
        ))
    })?;

    let expected = hex::decode(hex_digest)
        .map_err(|_| DeployError::InvalidTrigger("signature is not valid hex".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| DeployError::InvalidTrigger("unusable webhook secret".to_string()))?;
    mac.update(body);

    // verify_slice is constant-time
    mac.verify_slice(&expected)
        .map_err(|_| DeployError::InvalidTrigger("signature mismatch".to_string()))
}

/// Compute the signature header value for a body and secret.
///
/// The counterpart of [`verify_signature`]; used by tests and by anything
/// that needs to emit a trigger molt will accept.
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeployStatus;

    const SECRET: &str = "s3cret";
    const TRACKED: &str = "refs/heads/main";

    fn push_body(git_ref: &str, deleted: bool, head: Option<&str>) -> Vec<u8> {
        let head_commit = match head {
            Some(id) => format!(r#"{{ "id": "{}" }}"#, id),
            None => "null".to_string(),
        };
        format!(
            r#"{{
                "ref": "{}",
                "deleted": {},
                "head_commit": {},
                "repository": {{ "clone_url": "https://github.com/acme/widget.git" }}
            }}"#,
            git_ref, deleted, head_commit
        )
        .into_bytes()
    }

    fn signed(event: &str, body: Vec<u8>) -> InboundTrigger {
        let signature = sign(&body, SECRET);
        InboundTrigger::new(event, Some(signature), body)
    }

    #[test]
    fn test_valid_push_extracts_event() {
        let trigger = signed("push", push_body(TRACKED, false, Some("abc123")));

        let event = validate(&trigger, SECRET, TRACKED).unwrap();
        assert_eq!(event.clone_url, "https://github.com/acme/widget.git");
        assert_eq!(event.revision, "abc123");
    }

    #[test]
    fn test_bad_signature_is_invalid() {
        let body = push_body(TRACKED, false, Some("abc123"));
        let trigger = InboundTrigger::new("push", Some(sign(&body, "wrong-secret")), body);

        let err = validate(&trigger, SECRET, TRACKED).unwrap_err();
        assert_eq!(err.status(), DeployStatus::RejectedInvalid);
    }

    #[test]
    fn test_missing_signature_is_invalid() {
        let trigger = InboundTrigger::new("push", None, push_body(TRACKED, false, Some("abc")));

        let err = validate(&trigger, SECRET, TRACKED).unwrap_err();
        assert_eq!(err.status(), DeployStatus::RejectedInvalid);
    }

    #[test]
    fn test_malformed_signature_is_invalid() {
        let body = push_body(TRACKED, false, Some("abc"));
        let trigger = InboundTrigger::new("push", Some("sha256=zz-not-hex".to_string()), body);

        let err = validate(&trigger, SECRET, TRACKED).unwrap_err();
        assert_eq!(err.status(), DeployStatus::RejectedInvalid);
    }

    #[test]
    fn test_signature_checked_before_payload_parse() {
        // Garbage body with a bad signature must fail on the signature, not
        // on JSON parsing
        let body = b"not json at all".to_vec();
        let trigger = InboundTrigger::new("push", Some("sha256=00ff".to_string()), body);

        let err = validate(&trigger, SECRET, TRACKED).unwrap_err();
        assert!(err.to_string().contains("signature"));
    }

    #[test]
    fn test_non_push_event_is_not_actionable() {
        let trigger = signed("ping", push_body(TRACKED, false, Some("abc")));

        let err = validate(&trigger, SECRET, TRACKED).unwrap_err();
        assert_eq!(err.status(), DeployStatus::RejectedNotActionable);
    }

    #[test]
    fn test_deleted_ref_is_not_actionable() {
        let trigger = signed("push", push_body(TRACKED, true, None));

        let err = validate(&trigger, SECRET, TRACKED).unwrap_err();
        assert_eq!(err.status(), DeployStatus::RejectedNotActionable);
    }

    #[test]
    fn test_untracked_ref_is_not_actionable() {
        let trigger = signed("push", push_body("refs/heads/feature", false, Some("abc")));

        let err = validate(&trigger, SECRET, TRACKED).unwrap_err();
        assert_eq!(err.status(), DeployStatus::RejectedNotActionable);
    }

    #[test]
    fn test_missing_head_commit_is_not_actionable() {
        let trigger = signed("push", push_body(TRACKED, false, None));

        let err = validate(&trigger, SECRET, TRACKED).unwrap_err();
        assert_eq!(err.status(), DeployStatus::RejectedNotActionable);
    }

    #[test]
    fn test_malformed_payload_with_good_signature_is_invalid() {
        let trigger = signed("push", b"{ not json".to_vec());

        let err = validate(&trigger, SECRET, TRACKED).unwrap_err();
        assert_eq!(err.status(), DeployStatus::RejectedInvalid);
    }

    #[test]
    fn test_empty_secret_skips_signature() {
        let trigger =
            InboundTrigger::new("push", None, push_body(TRACKED, false, Some("abc123")));

        let event = validate(&trigger, "", TRACKED).unwrap();
        assert_eq!(event.revision, "abc123");
    }
}
