use crate::SessionId;
use crate::config::CookieSigningConfig;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use errors::DecodeError;
use ring::hmac;

#[derive(Clone)]
/// Encode session ids into cookie values, and decode them back.
///
/// # Signed cookies
///
/// When a secret is configured, the cookie value is the URL-safe base64 encoding
/// (without padding) of `signature ‖ payload`, where `payload` is the JSON
/// representation of the session id and `signature` is the HMAC of the payload,
/// keyed with `salt ‖ secret`.
///
/// # Unsigned cookies
///
/// Without a secret, the cookie value is the raw session id. The server will
/// then accept any value the client sends back.
pub struct CookieCodec(Inner);

#[derive(Clone)]
enum Inner {
    Signed {
        key: hmac::Key,
        signature_len: usize,
    },
    Plain,
}

impl std::fmt::Debug for CookieCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.0 {
            Inner::Signed { .. } => "signed",
            Inner::Plain => "plain",
        };
        f.debug_struct("CookieCodec")
            .field("kind", &kind)
            .finish_non_exhaustive()
    }
}

impl CookieCodec {
    /// Build a codec from the signing configuration.
    pub fn new(config: &CookieSigningConfig) -> Self {
        match &config.secret {
            Some(secret) => {
                let mut key_material = config.salt.as_bytes().to_vec();
                key_material.extend_from_slice(secret.expose_secret().as_bytes());
                Self(Inner::Signed {
                    key: hmac::Key::new(config.algorithm.hmac(), &key_material),
                    signature_len: config.algorithm.signature_len(),
                })
            }
            None => Self(Inner::Plain),
        }
    }

    /// A codec that sends raw session ids to the client.
    pub fn plain() -> Self {
        Self(Inner::Plain)
    }

    /// Returns `true` if cookie values are signed.
    pub fn is_signed(&self) -> bool {
        matches!(self.0, Inner::Signed { .. })
    }

    /// Encode a session id into a cookie value.
    pub fn encode(&self, id: &SessionId) -> String {
        match &self.0 {
            Inner::Plain => id.inner().to_owned(),
            Inner::Signed { key, .. } => {
                // Serializing a string into JSON can't fail.
                let payload = serde_json::to_vec(id.inner()).unwrap_or_default();
                let signature = hmac::sign(key, &payload);
                let mut buffer = Vec::with_capacity(signature.as_ref().len() + payload.len());
                buffer.extend_from_slice(signature.as_ref());
                buffer.extend_from_slice(&payload);
                URL_SAFE_NO_PAD.encode(buffer)
            }
        }
    }

    /// Decode a cookie value into a session id.
    ///
    /// The signature is verified in constant time.
    pub fn decode(&self, value: &str) -> Result<SessionId, DecodeError> {
        match &self.0 {
            Inner::Plain => SessionId::from_client(value).ok_or(DecodeError::EmptyId),
            Inner::Signed { key, signature_len } => {
                let buffer = URL_SAFE_NO_PAD.decode(value.trim_end_matches('='))?;
                if buffer.len() < *signature_len {
                    return Err(DecodeError::Truncated);
                }
                let (signature, payload) = buffer.split_at(*signature_len);
                hmac::verify(key, payload, signature)
                    .map_err(|_| DecodeError::SignatureMismatch)?;
                let raw: String = serde_json::from_slice(payload)?;
                SessionId::from_client(raw).ok_or(DecodeError::EmptyId)
            }
        }
    }
}

/// Errors that can occur when decoding a session cookie.
pub mod errors {
    #[derive(Debug, thiserror::Error)]
    #[non_exhaustive]
    /// The error returned by [`CookieCodec::decode`][super::CookieCodec::decode].
    pub enum DecodeError {
        #[error("The session cookie is not valid URL-safe base64")]
        InvalidBase64(#[from] base64::DecodeError),
        #[error("The session cookie is too short to contain a signature")]
        Truncated,
        #[error("The signature of the session cookie doesn't match its content")]
        SignatureMismatch,
        #[error("The signed payload of the session cookie is not a JSON string")]
        InvalidPayload(#[from] serde_json::Error),
        #[error("The session cookie carries an empty session id")]
        EmptyId,
    }
}
