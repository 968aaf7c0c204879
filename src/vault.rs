//! Credential vault: the API key at rest.
//!
//! `store` seals the key under a passphrase-derived AES-256-GCM key and
//! writes it to the config file with owner-only permissions. `load`
//! reverses that and additionally checks a SHA-256 content hash of the
//! plaintext, so corruption is caught even if the AEAD layer were ever
//! bypassed. The derived key never outlives a single call.
//!
//! The vault operates on an explicit config directory; production code
//! uses [`Vault::open_default`], tests point it at a temp dir.

use std::path::{Path, PathBuf};

use crate::api::EpicClient;
use crate::config::{self, Config};
use crate::crypto;
use crate::error::{EimgError, Result};

/// Handle on the credential store rooted at one config directory.
pub struct Vault {
    dir: PathBuf,
}

impl Vault {
    /// Vault at the default per-user location (`~/.eimg`).
    pub fn open_default() -> Self {
        Self {
            dir: config::default_config_dir(),
        }
    }

    /// Vault at an explicit directory.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the current config record, if any.
    pub fn config(&self) -> Result<Option<Config>> {
        Config::load(&self.dir)
    }

    /// Encrypt `raw_api_key` under `passphrase` and persist it.
    ///
    /// Generates a fresh salt every time, so re-running `set` rotates
    /// the ciphertext even for an unchanged key. Non-credential fields
    /// of an existing config survive.
    pub fn store(&self, raw_api_key: &str, passphrase: &str) -> Result<Config> {
        let salt = crypto::generate_salt();
        let key = crypto::derive_key(passphrase, &salt);
        let sealed = crypto::seal(raw_api_key.as_bytes(), &key)?;
        let hash = crypto::key_fingerprint(raw_api_key.as_bytes());

        let mut config = Config::load(&self.dir)?.unwrap_or_default();
        config.set_credential(&sealed, &salt, &hash);
        config.save(&self.dir)?;

        tracing::info!(dir = %self.dir.display(), "API key stored");
        Ok(config)
    }

    /// Decrypt and return the stored API key.
    ///
    /// Fails with `ConfigMissing` when nothing is stored, `Decryption`
    /// when the AEAD rejects the ciphertext (wrong passphrase or flipped
    /// bits), and `Integrity` when decryption succeeds but the content
    /// hash of the recovered plaintext does not match the stored one.
    pub fn load(&self, passphrase: &str) -> Result<String> {
        let config = Config::load(&self.dir)?.ok_or(EimgError::ConfigMissing)?;
        let cred = config.credential()?;

        let key = crypto::derive_key(passphrase, &cred.salt);
        let plaintext = crypto::open(&cred.sealed_key, &key)?;

        let fingerprint = crypto::key_fingerprint(&plaintext);
        if fingerprint.as_slice() != cred.key_hash.as_slice() {
            return Err(EimgError::Integrity);
        }

        String::from_utf8(plaintext.to_vec()).map_err(|_| EimgError::Integrity)
    }

    /// Decrypt the key and confirm the remote service accepts it.
    ///
    /// `Ok(true)` when the service answered 200, `Ok(false)` when it
    /// rejected the key; network and 5xx failures propagate as errors.
    pub fn validate(&self, passphrase: &str) -> Result<bool> {
        let api_key = self.load(passphrase)?;
        let client = EpicClient::new(api_key)?;
        client.check_key()
    }

    /// Securely destroy the stored configuration. Idempotent.
    pub fn wipe(&self) -> Result<()> {
        config::wipe(&self.dir)?;
        tracing::info!(dir = %self.dir.display(), "configuration wiped");
        Ok(())
    }
}

/// Cheap client-side sanity check on the key format before any crypto
/// work: NASA API keys are long alphanumeric tokens, possibly with
/// `-`/`_` separators.
pub fn valid_key_format(api_key: &str) -> bool {
    let trimmed = api_key.trim();
    if trimmed.len() < 20 {
        return false;
    }
    trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as B64;
    use base64::Engine;
    use tempfile::TempDir;

    const KEY: &str = "DEMO_KEY_abcdefghijklmnop123456";
    const PASS: &str = "orbital-mechanics-9";

    fn vault() -> (TempDir, Vault) {
        let tmp = TempDir::new().unwrap();
        let vault = Vault::at(tmp.path().join("cfg"));
        (tmp, vault)
    }

    #[test]
    fn store_then_load_returns_exact_key() {
        let (_tmp, vault) = vault();
        vault.store(KEY, PASS).unwrap();
        assert_eq!(vault.load(PASS).unwrap(), KEY);
    }

    #[test]
    fn load_without_store_is_config_missing() {
        let (_tmp, vault) = vault();
        assert!(matches!(vault.load(PASS), Err(EimgError::ConfigMissing)));
    }

    #[test]
    fn wrong_passphrase_never_yields_a_key() {
        let (_tmp, vault) = vault();
        vault.store(KEY, PASS).unwrap();
        assert!(matches!(
            vault.load("not-the-passphrase"),
            Err(EimgError::Decryption)
        ));
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let (_tmp, vault) = vault();
        vault.store(KEY, PASS).unwrap();

        let mut config = vault.config().unwrap().unwrap();
        let mut sealed = B64.decode(config.encrypted_api_key.as_ref().unwrap()).unwrap();
        let mid = sealed.len() / 2;
        sealed[mid] ^= 0x80;
        config.encrypted_api_key = Some(B64.encode(&sealed));
        config.save(vault.dir()).unwrap();

        assert!(matches!(vault.load(PASS), Err(EimgError::Decryption)));
    }

    #[test]
    fn tampered_hash_is_an_integrity_failure() {
        let (_tmp, vault) = vault();
        vault.store(KEY, PASS).unwrap();

        let mut config = vault.config().unwrap().unwrap();
        let mut hash = B64.decode(config.key_hash.as_ref().unwrap()).unwrap();
        hash[0] ^= 0x01;
        config.key_hash = Some(B64.encode(&hash));
        config.save(vault.dir()).unwrap();

        // decryption itself succeeds; the content hash catches it
        assert!(matches!(vault.load(PASS), Err(EimgError::Integrity)));
    }

    #[test]
    fn restore_rotates_salt_and_ciphertext() {
        let (_tmp, vault) = vault();
        let first = vault.store(KEY, PASS).unwrap();
        let second = vault.store(KEY, PASS).unwrap();
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.encrypted_api_key, second.encrypted_api_key);
        assert_eq!(vault.load(PASS).unwrap(), KEY);
    }

    #[test]
    fn store_preserves_non_credential_fields() {
        let (_tmp, vault) = vault();
        let mut config = Config::default();
        config.default_output_dir = "/srv/earth".into();
        config.save(vault.dir()).unwrap();

        let stored = vault.store(KEY, PASS).unwrap();
        assert_eq!(stored.default_output_dir, "/srv/earth");
    }

    #[cfg(unix)]
    #[test]
    fn store_enforces_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, vault) = vault();
        vault.store(KEY, PASS).unwrap();

        let dir_mode = std::fs::metadata(vault.dir())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        let file_mode = std::fs::metadata(Config::path_in(vault.dir()))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
        assert_eq!(file_mode, 0o600);
    }

    #[test]
    fn wipe_twice_is_fine() {
        let (_tmp, vault) = vault();
        vault.store(KEY, PASS).unwrap();
        vault.wipe().unwrap();
        assert!(matches!(vault.load(PASS), Err(EimgError::ConfigMissing)));
        vault.wipe().unwrap();
    }

    #[test]
    fn key_format_rules() {
        assert!(valid_key_format("AbCdEfGhIjKlMnOpQrStUv123456"));
        assert!(valid_key_format("with-dashes_and_underscores0"));
        assert!(!valid_key_format("short"));
        assert!(!valid_key_format("has spaces but is long enough"));
    }
}
