//! Type definitions and wrappers for secure data handling
//!
//! Key material and API session tokens are wrapped with the secrecy crate
//! so they never end up in logs or debug output.

use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

/// Ed25519 client private key seed, base64-encoded
///
/// This is the key the local agent authenticates with; the matching public
/// key is embedded in the client certificate.
#[derive(Clone, Debug)]
pub struct ClientPrivateKey(Secret<String>);

impl ClientPrivateKey {
    pub fn new(encoded: String) -> Self {
        Self(Secret::new(encoded))
    }

    /// Expose the encoded seed (use with caution!)
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<String> for ClientPrivateKey {
    fn from(encoded: String) -> Self {
        Self::new(encoded)
    }
}

/// PEM rendition of the client private key handed to the agent transport
#[derive(Clone, Debug)]
pub struct ClientKeyPem(Secret<String>);

impl ClientKeyPem {
    pub fn new(pem: String) -> Self {
        Self(Secret::new(pem))
    }

    /// Expose the PEM text (use with caution!)
    ///
    /// Only the transport constructor should need this.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Selector of a forked API session, pushed to the network extension
#[derive(Clone, Debug)]
pub struct SessionSelector(Secret<String>);

impl SessionSelector {
    pub fn new(selector: String) -> Self {
        Self(Secret::new(selector))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<String> for SessionSelector {
    fn from(selector: String) -> Self {
        Self::new(selector)
    }
}

/// API session cookie forwarded along with a session selector
///
/// Field names follow the HTTP cookie property names the extension
/// expects in the JSON payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "Path", default = "default_cookie_path")]
    pub path: String,
    #[serde(rename = "Expires", default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// Keyring service under which all credentials are stored
pub const KEYRING_SERVICE: &str = "smartvpn";

/// Keyring account names
pub const KEYRING_ACCOUNT_KEYS: &str = "vpn-keys";
pub const KEYRING_ACCOUNT_CERTIFICATE: &str = "vpn-certificate";
pub const KEYRING_ACCOUNT_FEATURES: &str = "vpn-certificate-features";
