//! Passphrase-based key derivation and authenticated encryption.
//!
//! The API key at rest is sealed with AES-256-GCM under a key derived
//! from the user's passphrase via PBKDF2-HMAC-SHA256. The salt is not
//! secret and is stored next to the ciphertext; the derived key lives
//! only for the duration of one seal/open call and is zeroized on drop.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{EimgError, Result};

/// Size of the derived encryption key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the per-installation random salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Size of the AES-GCM nonce in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

/// PBKDF2 iteration count. Deliberately slow.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Generate a fresh random salt for a new installation.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit key from a passphrase and salt.
///
/// Deterministic: the same passphrase and salt always produce the same
/// key, which is what makes later decryption possible. A wrong
/// passphrase yields a key the AEAD will reject downstream.
pub fn derive_key(passphrase: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut *key);
    key
}

/// Encrypt plaintext under the given key.
///
/// Output layout is `nonce || ciphertext+tag`; the nonce is random per
/// call, which is safe at this call volume (one seal per `set`).
pub fn seal(plaintext: &[u8], key: &[u8; KEY_SIZE]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| {
            EimgError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "AES-GCM encryption failed",
            ))
        })?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a `nonce || ciphertext+tag` blob produced by [`seal`].
///
/// Fails with [`EimgError::Decryption`] when the authentication tag does
/// not verify — wrong passphrase and flipped ciphertext bits are
/// indistinguishable here, on purpose.
pub fn open(sealed: &[u8], key: &[u8; KEY_SIZE]) -> Result<Zeroizing<Vec<u8>>> {
    if sealed.len() < NONCE_SIZE {
        return Err(EimgError::Decryption);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| EimgError::Decryption)?;
    Ok(Zeroizing::new(plaintext))
}

/// SHA-256 content hash of the plaintext key, stored alongside the
/// ciphertext for tamper detection independent of the AEAD tag.
pub fn key_fingerprint(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let salt = [7u8; SALT_SIZE];
        let a = derive_key("hunter2hunter2", &salt);
        let b = derive_key("hunter2hunter2", &salt);
        assert_eq!(*a, *b);

        let c = derive_key("hunter2hunter3", &salt);
        assert_ne!(*a, *c);
    }

    #[test]
    fn different_salt_different_key() {
        let a = derive_key("passphrase", &[1u8; SALT_SIZE]);
        let b = derive_key("passphrase", &[2u8; SALT_SIZE]);
        assert_ne!(*a, *b);
    }

    #[test]
    fn seal_open_round_trip() {
        let key = derive_key("correct horse battery staple", &generate_salt());
        let sealed = seal(b"DEMO_NASA_KEY_1234567890", &key).unwrap();
        let opened = open(&sealed, &key).unwrap();
        assert_eq!(&*opened, b"DEMO_NASA_KEY_1234567890");
    }

    #[test]
    fn flipped_bit_fails_open() {
        let key = derive_key("pw", &[0u8; SALT_SIZE]);
        let mut sealed = seal(b"secret", &key).unwrap();
        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x01;
            assert!(
                matches!(open(&tampered, &key), Err(EimgError::Decryption)),
                "bit flip at byte {} was not rejected",
                i
            );
        }
        // untouched blob still opens
        sealed[0] ^= 0x00;
        assert!(open(&sealed, &key).is_ok());
    }

    #[test]
    fn wrong_key_fails_open() {
        let salt = generate_salt();
        let sealed = seal(b"secret", &derive_key("right", &salt)).unwrap();
        let wrong = derive_key("wrong", &salt);
        assert!(matches!(open(&sealed, &wrong), Err(EimgError::Decryption)));
    }

    #[test]
    fn truncated_blob_fails_open() {
        let key = derive_key("pw", &[0u8; SALT_SIZE]);
        assert!(matches!(open(&[1, 2, 3], &key), Err(EimgError::Decryption)));
    }
}
