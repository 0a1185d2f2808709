//! Authenticated encryption of the artifact bytes.
//!
//! Wire format: `nonce (12 bytes) || AES-256-GCM(marker || payload)`.
//!
//! The single marker byte inside the authenticated envelope records
//! whether the payload was gzip-compressed, so the decrypt path never has
//! to guess. Compression is best-effort on encrypt: a gzip failure
//! degrades to the raw payload instead of failing the operation.
//!
//! The format carries no version or algorithm tag; changing the KDF
//! parameters or the cipher makes existing artifacts undecryptable, and
//! the remediation is to delete and rebuild them.

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::DerivedKey;
use crate::secrets::SecretBundle;
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::RngCore;
use std::io::{Read, Write};

/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Payload marker: raw bytes (compression failed or was skipped).
const MARKER_RAW: u8 = 0x00;
/// Payload marker: gzip-compressed bytes.
const MARKER_GZIP: u8 = 0x01;

/// Seals and opens artifact payloads with a derived key.
pub struct ArtifactCipher {
    cipher: Aes256Gcm,
}

impl ArtifactCipher {
    /// Creates a cipher from a derived key.
    #[must_use]
    pub fn new(key: &DerivedKey) -> Self {
        // Infallible: DerivedKey is always exactly 32 bytes, AES-256's key size.
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Compresses (best-effort) and encrypts a plaintext payload.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Integrity`] if the cipher itself fails,
    /// which with valid inputs it does not.
    pub fn seal(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let envelope = match gzip_compress(plaintext) {
            Ok(compressed) => {
                let mut e = Vec::with_capacity(1 + compressed.len());
                e.push(MARKER_GZIP);
                e.extend_from_slice(&compressed);
                e
            }
            Err(err) => {
                tracing::warn!(error = %err, "gzip failed, sealing uncompressed payload");
                let mut e = Vec::with_capacity(1 + plaintext.len());
                e.push(MARKER_RAW);
                e.extend_from_slice(plaintext);
                e
            }
        };

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, envelope.as_slice())
            .map_err(|_| CryptoError::integrity("encryption error"))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend(ciphertext);
        Ok(result)
    }

    /// Authenticates, decrypts and decompresses a sealed payload.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Integrity`] when the data was tampered with,
    /// truncated, or sealed under a different key (a wrong password yields
    /// a different key and therefore lands here, never in silent garbage).
    pub fn open(&self, sealed: &[u8]) -> CryptoResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE + 1 {
            return Err(CryptoError::integrity("ciphertext too short"));
        }

        let nonce = Nonce::from_slice(&sealed[..NONCE_SIZE]);
        let envelope = self
            .cipher
            .decrypt(nonce, &sealed[NONCE_SIZE..])
            .map_err(|_| CryptoError::integrity("wrong password or corrupted artifact"))?;

        match envelope.split_first() {
            Some((&MARKER_GZIP, payload)) => gzip_decompress(payload)
                .map_err(|e| CryptoError::integrity(format!("authenticated payload failed to gunzip: {e}"))),
            Some((&MARKER_RAW, payload)) => Ok(payload.to_vec()),
            Some((marker, _)) => Err(CryptoError::integrity(format!(
                "unknown payload marker {marker:#04x}"
            ))),
            None => Err(CryptoError::integrity("empty envelope")),
        }
    }
}

impl std::fmt::Debug for ArtifactCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCipher")
            .field("cipher", &"Aes256Gcm")
            .finish()
    }
}

/// Derives the key from the bundle and seals the payload in one step.
///
/// # Errors
///
/// Propagates key-derivation errors ([`CryptoError::MissingSecret`],
/// [`CryptoError::ConfigDecode`]) and cipher failures.
pub fn encrypt(plaintext: &[u8], bundle: &SecretBundle) -> CryptoResult<Vec<u8>> {
    let key = DerivedKey::derive(bundle)?;
    ArtifactCipher::new(&key).seal(plaintext)
}

/// Derives the key from the bundle and opens the payload in one step.
///
/// # Errors
///
/// Propagates key-derivation errors and [`CryptoError::Integrity`].
pub fn decrypt(sealed: &[u8], bundle: &SecretBundle) -> CryptoResult<Vec<u8>> {
    let key = DerivedKey::derive(bundle)?;
    ArtifactCipher::new(&key).open(sealed)
}

fn gzip_compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn gzip_decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::{KEY_PASSWORD, KEY_SALT_PRIMARY};
    use proptest::prelude::*;

    fn bundle(password: &str) -> SecretBundle {
        SecretBundle::from_lookup(|key| {
            (key == KEY_PASSWORD).then(|| password.to_string())
        })
        .unwrap()
    }

    fn cipher(password: &str) -> ArtifactCipher {
        ArtifactCipher::new(&DerivedKey::derive(&bundle(password)).unwrap())
    }

    #[test]
    fn roundtrip() {
        let c = cipher("pw");
        let plaintext = b"od_aereo analytical database bytes";
        let sealed = c.seal(plaintext).unwrap();
        assert_eq!(c.open(&sealed).unwrap(), plaintext);
    }

    #[test]
    fn roundtrip_empty() {
        let c = cipher("pw");
        let sealed = c.seal(b"").unwrap();
        assert_eq!(c.open(&sealed).unwrap(), b"");
    }

    #[test]
    fn roundtrip_multi_megabyte() {
        let c = cipher("pw");
        // Repetitive like a real columnar database file; also proves the
        // gzip path on data that actually shrinks.
        let plaintext = vec![0x42u8; 4 * 1024 * 1024];
        let sealed = c.seal(&plaintext).unwrap();
        assert!(sealed.len() < plaintext.len());
        assert_eq!(c.open(&sealed).unwrap(), plaintext);
    }

    #[test]
    fn seal_is_randomized_open_is_not() {
        let c = cipher("pw");
        let s1 = c.seal(b"data").unwrap();
        let s2 = c.seal(b"data").unwrap();
        assert_ne!(s1, s2);
        assert_eq!(c.open(&s1).unwrap(), c.open(&s2).unwrap());
    }

    #[test]
    fn any_single_byte_flip_is_detected() {
        let c = cipher("pw");
        let sealed = c.seal(b"tamper target payload").unwrap();

        // Nonce, body and tag regions all participate in authentication.
        for index in 0..sealed.len() {
            let mut corrupted = sealed.clone();
            corrupted[index] ^= 0x01;
            let err = c.open(&corrupted).unwrap_err();
            assert!(
                err.is_auth_failure(),
                "flip at byte {index} was not reported as an integrity failure"
            );
        }
    }

    #[test]
    fn wrong_password_is_an_integrity_failure() {
        let sealed = encrypt(b"payload", &bundle("pw1")).unwrap();
        let err = decrypt(&sealed, &bundle("pw2")).unwrap_err();
        assert!(matches!(err, CryptoError::Integrity { .. }));
    }

    #[test]
    fn truncated_input_is_an_integrity_failure() {
        let c = cipher("pw");
        let err = c.open(&[0u8; NONCE_SIZE + TAG_SIZE]).unwrap_err();
        assert!(matches!(err, CryptoError::Integrity { .. }));
    }

    #[test]
    fn missing_password_propagates_from_derivation() {
        let empty = SecretBundle::from_lookup(|_| None).unwrap();
        let err = encrypt(b"x", &empty).unwrap_err();
        assert!(matches!(err, CryptoError::MissingSecret { .. }));
    }

    #[test]
    fn decrypt_respects_salted_bundles() {
        let salted = SecretBundle::from_lookup(|key| match key {
            KEY_PASSWORD => Some("pw".to_string()),
            KEY_SALT_PRIMARY => Some("b64:c2FsdA==".to_string()),
            _ => None,
        })
        .unwrap();
        let sealed = encrypt(b"payload", &salted).unwrap();
        assert_eq!(decrypt(&sealed, &salted).unwrap(), b"payload");
        // Same password, different salt: different key.
        assert!(decrypt(&sealed, &bundle("pw")).unwrap_err().is_auth_failure());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn roundtrip_arbitrary_bytes(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let c = cipher("property");
            let sealed = c.seal(&payload).unwrap();
            prop_assert_eq!(c.open(&sealed).unwrap(), payload);
        }
    }
}
