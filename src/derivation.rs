//! Note Derivation Engine
//!
//! Deterministically derives deposit notes (commitment/nullifier pairs)
//! from a master key, a bucket and an index. Pure: identical inputs always
//! produce the identical note, and the engine never persists or broadcasts
//! anything.
//!
//! The key-derivation capability is a trait so that wallets backed by a
//! hardware signer or an HD keyring can plug in their own hierarchy; the
//! built-in [`SeedKeyDeriver`] derives from a 32-byte seed with
//! domain-separated SHA-256.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::deposit::types::DepositNote;
use crate::registry::Bucket;

/// Hardened-path style bound on the derivation index
pub const MAX_DERIVATION_INDEX: u64 = 0x7FFF_FFFF;

/// Derivation failures
#[derive(Debug, Error)]
pub enum DerivationError {
    #[error("key-derivation capability unavailable: {0}")]
    Unavailable(String),

    #[error("derivation index {index} exceeds path bound {max}")]
    IndexOutOfBounds { index: u64, max: u64 },
}

/// Secret material backing one deposit note
#[derive(Clone)]
pub struct NoteKeyMaterial {
    pub nullifier: [u8; 32],
    pub secret: [u8; 32],
}

/// Path identifying one note slot in the key hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    pub bucket: Bucket,
    pub index: u64,
}

impl DerivationPath {
    /// Stable byte encoding of the path, fed into the key derivation
    pub fn encode(&self) -> Vec<u8> {
        format!(
            "{}/{}/{}/{}",
            self.bucket.network().chain_id(),
            self.bucket.currency(),
            self.bucket.amount(),
            self.index
        )
        .into_bytes()
    }
}

/// Key-derivation capability consumed by the engine
#[cfg_attr(test, mockall::automock)]
pub trait KeyDeriver: Send + Sync {
    /// Derive the secret material for a path. Must be deterministic.
    fn derive(&self, path: &DerivationPath) -> Result<NoteKeyMaterial, DerivationError>;
}

/// Seed-backed key deriver: domain-separated SHA-256 over the master seed
/// and the encoded path.
pub struct SeedKeyDeriver {
    master: [u8; 32],
}

impl SeedKeyDeriver {
    pub fn new(master: [u8; 32]) -> Self {
        Self { master }
    }

    fn derive_domain(&self, domain: &[u8], path: &DerivationPath) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        hasher.update(self.master);
        hasher.update(path.encode());
        hasher.finalize().into()
    }
}

impl KeyDeriver for SeedKeyDeriver {
    fn derive(&self, path: &DerivationPath) -> Result<NoteKeyMaterial, DerivationError> {
        Ok(NoteKeyMaterial {
            nullifier: self.derive_domain(b"blankpool/nullifier/v1", path),
            secret: self.derive_domain(b"blankpool/secret/v1", path),
        })
    }
}

/// Compute the public commitment for a note's secret material:
/// SHA256(nullifier || secret), hex-encoded.
pub fn commitment_hex(material: &NoteKeyMaterial) -> String {
    let mut hasher = Sha256::new();
    hasher.update(material.nullifier);
    hasher.update(material.secret);
    hex::encode(hasher.finalize())
}

/// Derivation engine: maps (key deriver, bucket, index) to a deposit note
#[derive(Clone)]
pub struct NoteDeriver {
    keys: Arc<dyn KeyDeriver>,
}

impl NoteDeriver {
    pub fn new(keys: Arc<dyn KeyDeriver>) -> Self {
        Self { keys }
    }

    /// Derive the note at `index` within `bucket`.
    ///
    /// The bucket carries its own validity proof (it can only be built
    /// through the registry), so the remaining preconditions are the
    /// index bound and the availability of the key capability. The
    /// returned note is in-memory only, not yet broadcast.
    pub fn derive_note(&self, bucket: &Bucket, index: u64) -> Result<DepositNote, DerivationError> {
        if index > MAX_DERIVATION_INDEX {
            return Err(DerivationError::IndexOutOfBounds {
                index,
                max: MAX_DERIVATION_INDEX,
            });
        }

        let path = DerivationPath {
            bucket: bucket.clone(),
            index,
        };
        let material = self.keys.derive(&path)?;

        Ok(DepositNote::new(
            bucket.clone(),
            index,
            commitment_hex(&material),
            hex::encode(material.nullifier),
            hex::encode(material.secret),
        ))
    }
}
