//! Authentication material attached to every outgoing request.
//!
//! Feedbin authenticates with HTTP Basic auth. The account owns its
//! credentials; the API caller borrows them at construction and never
//! persists them (secure storage is the owner's concern).

use secrecy::{ExposeSecret, SecretString};

/// Basic-auth credential pair for a sync account.
///
/// Custom Debug impl masks the secret to prevent leakage in logs,
/// error messages, and debug output.
#[derive(Clone)]
pub struct Credentials {
    /// Account username (Feedbin: the account email address).
    pub username: String,
    secret: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    /// Expose the secret for request signing. Call sites should hand the
    /// value straight to the HTTP layer and not store it.
    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_masks_secret() {
        let creds = Credentials::new("user@example.com", "hunter2-password");
        let debug_output = format!("{:?}", creds);
        assert!(
            !debug_output.contains("hunter2-password"),
            "Debug output should not contain the secret"
        );
        assert!(debug_output.contains("[REDACTED]"));
        assert!(debug_output.contains("user@example.com"));
    }

    #[test]
    fn test_secret_round_trip() {
        let creds = Credentials::new("user", "pw");
        assert_eq!(creds.secret(), "pw");
    }
}
