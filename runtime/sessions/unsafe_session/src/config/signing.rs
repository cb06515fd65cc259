use redact::Secret;

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
/// Configure how the session cookie value is signed.
pub struct CookieSigningConfig {
    /// The key used to sign the session cookie.
    ///
    /// It should be at least as long as the block size of the chosen
    /// [algorithm](Self::algorithm), e.g. 64 bytes for `sha512`.
    ///
    /// If `None`, cookie signing is disabled and the raw session id is sent to
    /// the client. Any value the client sends back is then accepted as a session id.
    #[serde(default)]
    pub secret: Option<Secret<String>>,
    /// The HMAC digest algorithm used for signing.
    ///
    /// By default, it's set to [`SigningAlgorithm::Sha512`].
    #[serde(default)]
    pub algorithm: SigningAlgorithm,
    /// A namespace prepended to the secret, to avoid collisions between
    /// different uses of a shared secret.
    ///
    /// By default, it's set to `unsafe.session.`.
    #[serde(default = "default_salt")]
    pub salt: String,
}

impl Default for CookieSigningConfig {
    fn default() -> Self {
        Self {
            secret: None,
            algorithm: Default::default(),
            salt: default_salt(),
        }
    }
}

impl CookieSigningConfig {
    /// Sign cookies using the given secret, keeping all other settings unchanged.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(Secret::new(secret.into()));
        self
    }
}

fn default_salt() -> String {
    "unsafe.session.".to_string()
}

/// The HMAC digest algorithm used to sign the session cookie.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SigningAlgorithm {
    /// HMAC-SHA256.
    Sha256,
    /// HMAC-SHA384.
    Sha384,
    /// HMAC-SHA512.
    ///
    /// This is the default.
    #[default]
    Sha512,
}

impl SigningAlgorithm {
    /// The length, in bytes, of the signature produced by this algorithm.
    pub fn signature_len(self) -> usize {
        match self {
            SigningAlgorithm::Sha256 => 32,
            SigningAlgorithm::Sha384 => 48,
            SigningAlgorithm::Sha512 => 64,
        }
    }

    pub(crate) fn hmac(self) -> ring::hmac::Algorithm {
        match self {
            SigningAlgorithm::Sha256 => ring::hmac::HMAC_SHA256,
            SigningAlgorithm::Sha384 => ring::hmac::HMAC_SHA384,
            SigningAlgorithm::Sha512 => ring::hmac::HMAC_SHA512,
        }
    }
}
