//! Multi-stage key derivation.
//!
//! The artifact key is a deterministic function of the secret bundle,
//! produced by chaining three KDFs with different cost models:
//!
//! 1. PBKDF2-HMAC-SHA512 (CPU-bound, 200k iterations)
//! 2. scrypt (memory-hard, N=2^14 r=8 p=1)
//! 3. HKDF-SHA256 (extract-and-expand)
//!
//! A "fixed entropy" digest computed from the textual configuration values
//! seeds the per-stage salts, so the scheme needs no stored per-install
//! salt: identical secrets reproduce the identical key on any host.

use crate::error::{CryptoError, CryptoResult};
use crate::secrets::SecretBundle;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use hkdf::Hkdf;
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the derived key in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Context string mixed into the fixed-entropy digest.
const FIXED_ENTROPY_CONTEXT: &str = "od_aero_fixed_entropy_2024";
/// HKDF info string for the final expansion.
const FINAL_KEY_INFO: &[u8] = b"od_aero_final_key_derivation_2024";

/// PBKDF2 stage parameters.
const PBKDF2_ITERATIONS: u32 = 200_000;
const PBKDF2_OUT_LEN: usize = 64;

/// scrypt stage parameters: N=2^14, r=8, p=1.
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// The derived 32-byte symmetric key.
///
/// Zeroized on drop; `Debug` never prints key material.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    /// Derives the artifact key from the secret bundle.
    ///
    /// Deterministic: the same bundle always yields the same key, which is
    /// what keeps the artifact decryptable across restarts and machines.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::MissingSecret`] when the password is empty.
    /// - [`CryptoError::KeyDerivation`] when a stage rejects its
    ///   parameters (should not happen with the fixed constants).
    pub fn derive(bundle: &SecretBundle) -> CryptoResult<Self> {
        bundle.validate()?;

        let fixed_entropy = fixed_entropy(bundle);

        // Stage 1: PBKDF2-HMAC-SHA512 over the entropy-enhanced password.
        let enhanced_password = format!("{}_{}", bundle.password(), bundle.entropy_factor());
        let mut salt1 = bundle.salt_primary().bytes().to_vec();
        salt1.extend_from_slice(&fixed_entropy[..16]);
        let mut k1 = [0u8; PBKDF2_OUT_LEN];
        pbkdf2::pbkdf2_hmac::<Sha512>(
            enhanced_password.as_bytes(),
            &salt1,
            PBKDF2_ITERATIONS,
            &mut k1,
        );

        // Stage 2: scrypt over the first half of k1. The pepper contributes
        // at most 16 bytes of salt; shorter peppers are used whole.
        let pepper = bundle.pepper().bytes();
        let mut salt2 = bundle.salt_secondary().bytes().to_vec();
        salt2.extend_from_slice(&pepper[..pepper.len().min(16)]);
        let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_SIZE)
            .map_err(|e| CryptoError::key_derivation(e.to_string()))?;
        let mut k2 = [0u8; KEY_SIZE];
        scrypt::scrypt(&k1[..KEY_SIZE], &salt2, &params, &mut k2)
            .map_err(|e| CryptoError::key_derivation(e.to_string()))?;

        // Stage 3: HKDF-SHA256 extract-and-expand.
        let mut salt3 = bundle.integrity_key().bytes().to_vec();
        salt3.extend_from_slice(&fixed_entropy[16..]);
        let mut ikm = k2.to_vec();
        ikm.extend_from_slice(pepper);
        let hk = Hkdf::<Sha256>::new(Some(&salt3), &ikm);
        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(FINAL_KEY_INFO, &mut bytes)
            .map_err(|_| CryptoError::key_derivation("HKDF expand failed"))?;

        k1.zeroize();
        k2.zeroize();
        ikm.zeroize();

        Ok(Self { bytes })
    }

    /// The raw key bytes.
    ///
    /// # Security
    ///
    /// Do not log or persist the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// The base64-url encoding of the key, matching the final encoding of
    /// the original derivation scheme.
    #[must_use]
    pub fn encoded(&self) -> String {
        URL_SAFE.encode(self.bytes)
    }

    /// A short hex fingerprint safe to show to operators.
    ///
    /// This is the truncated SHA-256 of the key, not the key itself.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.bytes);
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Computes the deterministic fixed-entropy digest.
///
/// Hashes the `_`-joined *textual* values of the entropy factor and both
/// salts together with a fixed context string. Textual on purpose: the
/// digest must match regardless of whether a salt was stored plain or
/// `b64:`-tagged.
fn fixed_entropy(bundle: &SecretBundle) -> [u8; 32] {
    let combined = [
        bundle.entropy_factor(),
        bundle.salt_primary().text(),
        bundle.salt_secondary().text(),
        FIXED_ENTROPY_CONTEXT,
    ]
    .join("_");
    Sha256::digest(combined.as_bytes()).into()
}
