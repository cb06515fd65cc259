use ring::rand::{SecureRandom, SystemRandom};

#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
/// The identifier for a session.
///
/// # Format
///
/// Server-generated identifiers are 16 random bytes, hex-encoded.
/// Identifiers received from the client are opaque strings: depending on
/// the [insecure configuration](crate::config::InsecureConfig), the store may
/// be asked to use an identifier it never issued.
pub struct SessionId(String);

/// The number of random bytes in a server-generated session id.
const RANDOM_ID_LEN: usize = 16;

impl SessionId {
    /// Generate a new random identifier using the random number generator
    /// provided by the underlying operating system.
    ///
    /// # Panics
    ///
    /// Panics if the operating system fails to provide randomness.
    pub fn random() -> Self {
        let mut bytes = [0u8; RANDOM_ID_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .expect("The operating system failed to provide randomness for a session id");
        Self(hex::encode(bytes))
    }

    /// Wrap an identifier received from the client.
    ///
    /// Returns `None` if the identifier is empty.
    pub fn from_client(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.is_empty() { None } else { Some(Self(raw)) }
    }

    /// Access the underlying string representation.
    pub fn inner(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
