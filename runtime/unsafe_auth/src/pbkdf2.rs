//! PBKDF2 hashes in the modular crypt format used by `passlib`:
//! `$pbkdf2-<digest>$<rounds>$<salt>$<checksum>`.
//!
//! Salt and checksum use the "adapted base64" alphabet: standard base64,
//! without padding, with `.` in place of `+`.
use crate::errors::HashError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

const SALT_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Digest {
    Sha256,
    Sha512,
}

impl Digest {
    fn ident(self) -> &'static str {
        match self {
            Digest::Sha256 => "pbkdf2-sha256",
            Digest::Sha512 => "pbkdf2-sha512",
        }
    }

    fn algorithm(self) -> pbkdf2::Algorithm {
        match self {
            Digest::Sha256 => pbkdf2::PBKDF2_HMAC_SHA256,
            Digest::Sha512 => pbkdf2::PBKDF2_HMAC_SHA512,
        }
    }

    fn checksum_len(self) -> usize {
        match self {
            Digest::Sha256 => 32,
            Digest::Sha512 => 64,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Pbkdf2Hash {
    digest: Digest,
    rounds: NonZeroU32,
    salt: Vec<u8>,
    checksum: Vec<u8>,
}

impl Pbkdf2Hash {
    /// Parse an encoded hash. Returns `None` if it isn't a well-formed hash for `digest`.
    pub(crate) fn parse(digest: Digest, encoded: &str) -> Option<Self> {
        let mut parts = encoded.strip_prefix('$')?.split('$');
        if parts.next()? != digest.ident() {
            return None;
        }
        let rounds = parts.next()?.parse().ok()?;
        let salt = ab64_decode(parts.next()?)?;
        let checksum = ab64_decode(parts.next()?)?;
        if parts.next().is_some() || checksum.len() != digest.checksum_len() {
            return None;
        }
        Some(Self {
            digest,
            rounds,
            salt,
            checksum,
        })
    }

    pub(crate) fn verify(&self, password: &[u8]) -> bool {
        pbkdf2::verify(
            self.digest.algorithm(),
            self.rounds,
            &self.salt,
            password,
            &self.checksum,
        )
        .is_ok()
    }
}

pub(crate) fn hash(digest: Digest, rounds: NonZeroU32, password: &[u8]) -> Result<String, HashError> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| HashError::Randomness)?;
    Ok(hash_with_salt(digest, rounds, &salt, password))
}

fn hash_with_salt(digest: Digest, rounds: NonZeroU32, salt: &[u8], password: &[u8]) -> String {
    let mut checksum = vec![0u8; digest.checksum_len()];
    pbkdf2::derive(digest.algorithm(), rounds, salt, password, &mut checksum);
    format!(
        "${}${}${}${}",
        digest.ident(),
        rounds,
        ab64_encode(salt),
        ab64_encode(&checksum)
    )
}

fn ab64_encode(bytes: &[u8]) -> String {
    STANDARD_NO_PAD.encode(bytes).replace('+', ".")
}

fn ab64_decode(encoded: &str) -> Option<Vec<u8>> {
    STANDARD_NO_PAD
        .decode(encoded.replace('.', "+").trim_end_matches('='))
        .ok()
}
