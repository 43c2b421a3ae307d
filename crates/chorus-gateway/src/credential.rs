//! Credential tokens and their lexical validation.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::GatewayError;

/// `<id>.<timestamp>.<hmac>` with an optional fourth segment.
static SEGMENTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{24,}\.[A-Za-z0-9_-]{6}\.[A-Za-z0-9_-]{27,}(\.[A-Za-z0-9_-]{27,})?$")
        .unwrap()
});

/// Legacy `mfa.` tokens are a fixed 84 characters after the prefix.
static MFA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^mfa\.[A-Za-z0-9_-]{84}$").unwrap());

/// Number of leading characters shown when a credential is labelled.
const LABEL_PREFIX_LEN: usize = 8;

/// Check whether `raw` (after trimming) has an accepted credential shape.
pub fn validate(raw: &str) -> bool {
    let token = raw.trim();
    !token.is_empty() && (SEGMENTED_RE.is_match(token) || MFA_RE.is_match(token))
}

/// A validated credential token.
///
/// `Debug` and `Display` only ever show a short prefix, so credentials can
/// be used freely as tracing fields.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        if validate(raw) {
            Ok(Self(raw.trim().to_string()))
        } else {
            Err(GatewayError::InvalidFormat)
        }
    }

    /// The full secret token. Only for the identify frame and directory requests.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short, non-secret label: the first characters followed by `...`.
    pub fn label(&self) -> String {
        let prefix: String = self.0.chars().take(LABEL_PREFIX_LEN).collect();
        format!("{prefix}...")
    }

    /// Name shown when the directory cannot resolve this credential.
    pub fn fallback_name(&self) -> String {
        format!("unknown user ({})", self.label())
    }
}

impl FromStr for Credential {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Borrow<str> for Credential {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.label()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
