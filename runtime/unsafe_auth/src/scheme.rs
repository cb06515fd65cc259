use crate::errors::HashError;
use crate::pbkdf2::{self, Digest, Pbkdf2Hash};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use std::num::NonZeroU32;
use subtle::ConstantTimeEq as _;

/// A password hashing scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PasswordScheme {
    /// Argon2id, PHC string format (`$argon2id$v=19$...`).
    Argon2,
    /// bcrypt (`$2b$<cost>$...`).
    Bcrypt {
        /// The work factor used for new hashes.
        cost: u32,
    },
    /// PBKDF2 with HMAC-SHA512, `passlib` format (`$pbkdf2-sha512$<rounds>$...`).
    Pbkdf2Sha512 {
        /// The number of iterations used for new hashes.
        rounds: NonZeroU32,
    },
    /// PBKDF2 with HMAC-SHA256, `passlib` format (`$pbkdf2-sha256$<rounds>$...`).
    Pbkdf2Sha256 {
        /// The number of iterations used for new hashes.
        rounds: NonZeroU32,
    },
    /// The password itself, stored as is.
    ///
    /// It recognises every string as one of its hashes.
    Plaintext,
}

impl PasswordScheme {
    /// bcrypt with the crate's default cost.
    pub fn bcrypt() -> Self {
        Self::Bcrypt {
            cost: bcrypt::DEFAULT_COST,
        }
    }

    /// PBKDF2-SHA512 with 100 000 rounds.
    pub fn pbkdf2_sha512() -> Self {
        Self::Pbkdf2Sha512 {
            rounds: NonZeroU32::new(100_000).unwrap_or(NonZeroU32::MIN),
        }
    }

    /// PBKDF2-SHA256 with 200 000 rounds.
    pub fn pbkdf2_sha256() -> Self {
        Self::Pbkdf2Sha256 {
            rounds: NonZeroU32::new(200_000).unwrap_or(NonZeroU32::MIN),
        }
    }

    /// The conventional name of the scheme, e.g. `pbkdf2_sha256`.
    pub fn name(&self) -> &'static str {
        match self {
            PasswordScheme::Argon2 => "argon2",
            PasswordScheme::Bcrypt { .. } => "bcrypt",
            PasswordScheme::Pbkdf2Sha512 { .. } => "pbkdf2_sha512",
            PasswordScheme::Pbkdf2Sha256 { .. } => "pbkdf2_sha256",
            PasswordScheme::Plaintext => "plaintext",
        }
    }

    /// Hash `password` with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, HashError> {
        match self {
            PasswordScheme::Argon2 => {
                let salt = SaltString::generate(&mut OsRng);
                Ok(Argon2::default()
                    .hash_password(password.as_bytes(), &salt)?
                    .to_string())
            }
            PasswordScheme::Bcrypt { cost } => Ok(bcrypt::hash(password, *cost)?),
            PasswordScheme::Pbkdf2Sha512 { rounds } => {
                pbkdf2::hash(Digest::Sha512, *rounds, password.as_bytes())
            }
            PasswordScheme::Pbkdf2Sha256 { rounds } => {
                pbkdf2::hash(Digest::Sha256, *rounds, password.as_bytes())
            }
            PasswordScheme::Plaintext => Ok(password.to_owned()),
        }
    }

    /// `true` if `hash` looks like it was produced by this scheme.
    pub fn identifies(&self, hash: &str) -> bool {
        match self {
            PasswordScheme::Argon2 => hash.starts_with("$argon2"),
            PasswordScheme::Bcrypt { .. } => ["$2a$", "$2b$", "$2x$", "$2y$"]
                .iter()
                .any(|prefix| hash.starts_with(prefix)),
            PasswordScheme::Pbkdf2Sha512 { .. } => hash.starts_with("$pbkdf2-sha512$"),
            PasswordScheme::Pbkdf2Sha256 { .. } => hash.starts_with("$pbkdf2-sha256$"),
            PasswordScheme::Plaintext => true,
        }
    }

    /// Check `password` against a hash produced by this scheme.
    ///
    /// A hash that claims to belong to this scheme but can't be parsed is an error.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, HashError> {
        match self {
            PasswordScheme::Argon2 => {
                let parsed = PasswordHash::new(hash)?;
                Ok(Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok())
            }
            PasswordScheme::Bcrypt { .. } => Ok(bcrypt::verify(password, hash)?),
            PasswordScheme::Pbkdf2Sha512 { .. } => Pbkdf2Hash::parse(Digest::Sha512, hash)
                .map(|parsed| parsed.verify(password.as_bytes()))
                .ok_or(HashError::Malformed { scheme: self.name() }),
            PasswordScheme::Pbkdf2Sha256 { .. } => Pbkdf2Hash::parse(Digest::Sha256, hash)
                .map(|parsed| parsed.verify(password.as_bytes()))
                .ok_or(HashError::Malformed { scheme: self.name() }),
            PasswordScheme::Plaintext => Ok(password.as_bytes().ct_eq(hash.as_bytes()).into()),
        }
    }
}

impl std::fmt::Display for PasswordScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
