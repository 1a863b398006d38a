//! Access-token discovery for Google Cloud Storage.
//!
//! Credentials are expected to be configured in the environment already. The
//! token is taken from, in order:
//! 1. `GOOGLE_OAUTH_ACCESS_TOKEN`
//! 2. `gcloud auth print-access-token`
//!
//! When neither yields a token, requests are sent anonymously, which works for
//! public buckets and local emulators.

use std::env;
use std::fmt;
use std::process::{Command, Stdio};

use tracing::debug;

/// Environment variable holding a ready-made OAuth2 access token.
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// An OAuth2 bearer token. The value is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token value. Blank values are rejected.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// The raw token for the Authorization header.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Find an access token from the environment or the gcloud CLI.
pub fn discover_access_token() -> Option<AccessToken> {
    if let Some(token) = env::var(ACCESS_TOKEN_ENV).ok().and_then(AccessToken::new) {
        debug!(source = ACCESS_TOKEN_ENV, "Using access token");
        return Some(token);
    }

    match gcloud_access_token() {
        Some(token) => {
            debug!(source = "gcloud", "Using access token");
            Some(token)
        }
        None => {
            debug!("No access token found, using anonymous requests");
            None
        }
    }
}

fn gcloud_access_token() -> Option<AccessToken> {
    let output = Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .stdin(Stdio::null())
        .output()
        .ok()?;

    if !output.status.success() {
        debug!(
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "gcloud did not return an access token"
        );
        return None;
    }

    AccessToken::new(String::from_utf8_lossy(&output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_token_rejected() {
        assert!(AccessToken::new("  \n").is_none());
    }

    #[test]
    fn test_token_trimmed() {
        let token = AccessToken::new("ya29.abc\n").unwrap();
        assert_eq!(token.secret(), "ya29.abc");
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = AccessToken::new("ya29.secret").unwrap();
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("secret"));
    }
}
