//! Identifier types used throughout the Guardian core.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque credential token naming one enrolled device.
///
/// Issued during enrollment and immutable afterwards. Existence is
/// authoritative in the external identity resolver; the core re-checks
/// it per connection or request rather than caching a resolution, so
/// device deletions take effect immediately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    /// Wraps a credential token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceIdentity {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for DeviceIdentity {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}
