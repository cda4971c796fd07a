//! BLAKE2s-256 digests of app binaries.
//!
//! The firmware hashes the app as it receives it; the host hashes the same bytes
//! from memory. The two must match exactly before the app is allowed to run.

use std::fmt;

use blake2::{Blake2s256, Digest as _};

use crate::error::Error;

/// Length of a digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// A 256-bit BLAKE2s digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_LEN]);
impl Digest {
    pub fn compute(data: &[u8]) -> Digest {
        let mut hasher = Blake2s256::new();
        hasher.update(data);
        let result = hasher.finalize();

        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&result);
        Digest(digest)
    }

    /// Take the first 32 bytes of `raw`, or `None` if there are fewer.
    pub fn from_slice(raw: &[u8]) -> Option<Digest> {
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(raw.get(..DIGEST_LEN)?);
        Some(Digest(digest))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Check the digest reported by the device against the one computed on the
    /// host.
    pub fn verify(host: &Digest, device: &Digest) -> Result<(), Error> {
        if host == device {
            Ok(())
        } else {
            Err(Error::Verification {
                host: *host,
                device: *device,
            })
        }
    }
}
impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Digest(bytes)
    }
}

/// Four space separated groups of 8 bytes in hex.
impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<String> = self.0.chunks(8).map(hex::encode).collect();
        f.write_str(&groups.join(" "))
    }
}
impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Digest").field(&hex::encode(self.0)).finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
