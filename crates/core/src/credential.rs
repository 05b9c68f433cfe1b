//! Remote API credential.

use std::fmt;

/// Opaque API secret. Read once at startup and immutable afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank input.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_credential_is_rejected() {
        assert!(Credential::new("   ").is_none());
        assert_eq!(Credential::new(" key ").unwrap().expose(), "key");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let cred = Credential::new("supersecret").unwrap();
        assert!(!format!("{:?}", cred).contains("supersecret"));
    }
}
