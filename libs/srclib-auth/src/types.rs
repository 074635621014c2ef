use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Opaque wrapper around a secret string value.
///
/// `Debug` and `Display` both print `[REDACTED]`. Use
/// [`expose`](Self::expose) when the raw value is needed to build a header
/// or write the credential store. The backing buffer is zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read-only access to the secret. Do not log the returned slice.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// A user identity for basic auth against one API endpoint.
///
/// Stored on disk as `{"UID": 42, "Key": "..."}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "StoredCredential", into = "StoredCredential")]
pub struct Credential {
    uid: i64,
    key: SecretString,
}

impl Credential {
    #[must_use]
    pub fn new(uid: i64, key: impl Into<String>) -> Self {
        Self {
            uid,
            key: SecretString::new(key),
        }
    }

    #[must_use]
    pub fn uid(&self) -> i64 {
        self.uid
    }

    #[must_use]
    pub fn key(&self) -> &SecretString {
        &self.key
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid && self.key.expose() == other.key.expose()
    }
}

impl Eq for Credential {}

#[derive(Serialize, Deserialize)]
struct StoredCredential {
    #[serde(rename = "UID")]
    uid: i64,
    #[serde(rename = "Key")]
    key: String,
}

impl From<StoredCredential> for Credential {
    fn from(stored: StoredCredential) -> Self {
        Self::new(stored.uid, stored.key)
    }
}

impl From<Credential> for StoredCredential {
    fn from(credential: Credential) -> Self {
        Self {
            uid: credential.uid,
            key: credential.key.expose().to_owned(),
        }
    }
}

/// A signed permission-grant ticket sent as `Authorization: Sourcegraph-Ticket <ticket>`.
#[derive(Clone, Debug)]
pub struct Ticket(SecretString);

impl Ticket {
    #[must_use]
    pub fn new(signed: impl Into<String>) -> Self {
        Self(SecretString::new(signed))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn secret_debug_and_display_are_redacted() {
        let s = SecretString::new("hunter2");
        assert_eq!(format!("{s:?}"), "[REDACTED]");
        assert_eq!(format!("{s}"), "[REDACTED]");
        assert_eq!(s.expose(), "hunter2");
    }

    #[test]
    fn secret_zeroize_clears_buffer() {
        let mut s = SecretString::new("sensitive");
        s.zeroize();
        assert!(s.0.is_empty(), "buffer should be empty after zeroize");
    }

    #[test]
    fn credential_debug_hides_key() {
        let cred = Credential::new(42, "super-secret-key");
        let dbg = format!("{cred:?}");
        assert!(dbg.contains("42"));
        assert!(!dbg.contains("super-secret-key"), "Debug leaked key: {dbg}");
    }

    #[test]
    fn credential_uses_stored_field_names() {
        let cred = Credential::new(7, "k");
        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json, serde_json::json!({"UID": 7, "Key": "k"}));

        let parsed: Credential = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, cred);
    }

    #[test]
    fn credential_rejects_missing_fields() {
        assert!(serde_json::from_str::<Credential>(r#"{"UID": 7}"#).is_err());
    }

    #[test]
    fn ticket_debug_hides_value() {
        let ticket = Ticket::new("signed.ticket.value");
        assert!(!format!("{ticket:?}").contains("signed"));
        assert_eq!(ticket.expose(), "signed.ticket.value");
    }
}
