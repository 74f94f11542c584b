//! VAPID credentials for Web Push (RFC 8292).

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::rand_core::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::NotificationError;

/// Contact email plus the key pair. Push is only available when all three
/// parts are present.
#[derive(Clone, Serialize, Deserialize)]
pub struct VapidCredentials {
    pub email: String,
    pub public_key: String,
    pub private_key: String,
}

impl VapidCredentials {
    /// Returns `None` unless every part is set and non-empty.
    pub fn from_parts(
        email: Option<String>,
        public_key: Option<String>,
        private_key: Option<String>,
    ) -> Option<Self> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Some(Self {
            email: non_empty(email)?,
            public_key: non_empty(public_key)?,
            private_key: non_empty(private_key)?,
        })
    }

    /// JWT `sub` claim
    pub fn subject(&self) -> String {
        if self.email.starts_with("mailto:") || self.email.starts_with("https://") {
            self.email.clone()
        } else {
            format!("mailto:{}", self.email)
        }
    }
}

impl std::fmt::Debug for VapidCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidCredentials")
            .field("email", &self.email)
            .field("public_key", &self.public_key)
            .field("private_key", &"***")
            .finish()
    }
}

/// Freshly generated P-256 key pair, both halves base64url without padding.
///
/// The private key is the raw 32-byte scalar, the format `web-push` reads
/// with `VapidSignatureBuilder::from_base64`.
#[derive(Debug, Serialize)]
pub struct VapidKeys {
    pub public_key: String,
    pub private_key: String,
}

impl VapidKeys {
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_point = signing_key.verifying_key().to_encoded_point(false);
        Self {
            public_key: BASE64URL.encode(public_point.as_bytes()),
            private_key: BASE64URL.encode(signing_key.to_bytes().as_slice()),
        }
    }
}

/// Decode a base64url application server key, tolerating padding and the
/// standard alphabet.
pub fn decode_application_server_key(key: &str) -> Result<Vec<u8>, NotificationError> {
    let normalized: String = key
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    BASE64URL
        .decode(normalized)
        .map_err(|e| NotificationError::NotConfigured(format!("Invalid VAPID public key: {e}")))
}
