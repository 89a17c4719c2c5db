use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use meridian_types::channel::{Channel, UnknownChannel};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelAuthError {
    #[error(transparent)]
    Unknown(#[from] UnknownChannel),

    #[error("channel '{0}' is not the caller's private channel")]
    NotOwner(String),
}

/// Signs and verifies private channel subscriptions.
///
/// A signature has the form `{key}:{hex(hmac_sha256(secret, "{socket_id}:{channel}"))}`,
/// the same shape the hosted service expects, so one signer serves both backends.
#[derive(Clone)]
pub struct ChannelSigner {
    key: String,
    secret: String,
}

impl ChannelSigner {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Authorize `user_id` to subscribe `socket_id` to `channel_name`.
    /// Only the user's own private channel is signed.
    pub fn authorize(
        &self,
        user_id: Uuid,
        socket_id: &str,
        channel_name: &str,
    ) -> Result<String, ChannelAuthError> {
        let channel: Channel = channel_name.parse()?;
        if channel.owner() != Some(user_id) {
            return Err(ChannelAuthError::NotOwner(channel_name.to_string()));
        }
        Ok(self.sign(socket_id, channel_name))
    }

    pub fn sign(&self, socket_id: &str, channel_name: &str) -> String {
        let mac = self.mac(socket_id, channel_name);
        format!("{}:{}", self.key, hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a signature produced by [`sign`](Self::sign) for this exact socket and channel.
    pub fn verify(&self, socket_id: &str, channel_name: &str, auth: &str) -> bool {
        let Some((key, digest)) = auth.split_once(':') else {
            return false;
        };
        if key != self.key {
            return false;
        }
        let Ok(digest) = hex::decode(digest) else {
            return false;
        };
        self.mac(socket_id, channel_name).verify_slice(&digest).is_ok()
    }

    fn mac(&self, socket_id: &str, channel_name: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(socket_id.as_bytes());
        mac.update(b":");
        mac.update(channel_name.as_bytes());
        mac
    }
}
