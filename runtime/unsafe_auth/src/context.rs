use crate::PasswordScheme;
use crate::errors::HashError;
use std::sync::OnceLock;

/// A ranked list of password hashing schemes.
///
/// The first scheme is preferred: it's used for every new hash.
/// All the others are deprecated: hashes produced by them are still accepted,
/// but [`PasswordContext::verify_and_update`] replaces them on the next
/// successful verification.
#[derive(Debug)]
pub struct PasswordContext {
    schemes: Vec<PasswordScheme>,
    dummy_hash: OnceLock<String>,
}

impl Default for PasswordContext {
    /// bcrypt, then PBKDF2-SHA512 (100 000 rounds), PBKDF2-SHA256 (200 000 rounds)
    /// and plaintext.
    fn default() -> Self {
        Self::new(
            PasswordScheme::bcrypt(),
            [
                PasswordScheme::pbkdf2_sha512(),
                PasswordScheme::pbkdf2_sha256(),
                PasswordScheme::Plaintext,
            ],
        )
    }
}

impl PasswordContext {
    /// Create a context with a preferred scheme and, in order, the deprecated ones.
    pub fn new(
        preferred: PasswordScheme,
        deprecated: impl IntoIterator<Item = PasswordScheme>,
    ) -> Self {
        let mut schemes = vec![preferred];
        schemes.extend(deprecated);
        Self {
            schemes,
            dummy_hash: OnceLock::new(),
        }
    }

    /// The scheme used for new hashes.
    pub fn preferred(&self) -> &PasswordScheme {
        &self.schemes[0]
    }

    /// All schemes, preferred first.
    pub fn schemes(&self) -> &[PasswordScheme] {
        &self.schemes
    }

    /// Hash `password` with the preferred scheme.
    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        self.preferred().hash(password)
    }

    /// The scheme that produced `hash`, if any.
    ///
    /// Schemes are tried in order, so plaintext (if enabled) only matches
    /// what no other scheme recognises.
    pub fn identify(&self, hash: &str) -> Option<&PasswordScheme> {
        self.schemes.iter().find(|scheme| scheme.identifies(hash))
    }

    /// `true` if `hash` was produced by a deprecated scheme.
    pub fn needs_update(&self, hash: &str) -> bool {
        self.identify(hash)
            .is_some_and(|scheme| scheme != self.preferred())
    }

    /// Check `password` against `hash`.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, HashError> {
        let scheme = self.identify(hash).ok_or(HashError::Unidentified)?;
        scheme.verify(password, hash)
    }

    /// Check `password` against `hash` and, if it matches and `hash` was produced
    /// by a deprecated scheme, compute a replacement with the preferred one.
    ///
    /// It returns whether the password is valid and the replacement hash, if any.
    /// The replacement is `None` when the password is wrong.
    pub fn verify_and_update(
        &self,
        password: &str,
        hash: &str,
    ) -> Result<(bool, Option<String>), HashError> {
        let scheme = self.identify(hash).ok_or(HashError::Unidentified)?;
        if !scheme.verify(password, hash)? {
            return Ok((false, None));
        }
        if scheme == self.preferred() {
            return Ok((true, None));
        }
        Ok((true, Some(self.hash(password)?)))
    }

    /// Spend as much time as a real verification, for an account that doesn't exist.
    ///
    /// It verifies `password` against a hash of a throwaway password,
    /// computed with the preferred scheme on first use.
    pub fn dummy_verify(&self, password: &str) -> Result<(), HashError> {
        let dummy_hash = match self.dummy_hash.get() {
            Some(hash) => hash,
            None => {
                let hash = self.hash("not the password you are looking for")?;
                self.dummy_hash.get_or_init(|| hash)
            }
        };
        self.preferred().verify(password, dummy_hash)?;
        Ok(())
    }
}
