//! On-disk configuration record.
//!
//! A single JSON file at `~/.eimg/config.json` holds the encrypted API
//! key, its salt and integrity hash (all base64), plus non-secret
//! preferences. The directory is mode 0700 and the file 0600 on unix;
//! that is a security contract, not a convenience.
//!
//! The config is passed explicitly into every operation that needs it —
//! callers own the read/write lifecycle, there is no hidden global.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::NaiveDate;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{EimgError, Result};

/// Name of the config file inside the config directory.
pub const CONFIG_FILE: &str = "config.json";

/// Default per-user config directory: `~/.eimg`.
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".eimg")
}

/// The persisted configuration record.
///
/// Invariant: `encrypted_api_key`, `salt` and `key_hash` are all present
/// or all absent. Partial state is treated as corruption.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Base64 of `nonce || ciphertext+tag` produced by the vault.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_api_key: Option<String>,
    /// Base64 of the per-installation KDF salt. Not secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    /// Base64 SHA-256 of the plaintext API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_hash: Option<String>,
    /// Where downloads land when `--output` is not given.
    #[serde(default = "default_output_dir")]
    pub default_output_dir: String,
    /// Date of the last successful download, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_download_date: Option<NaiveDate>,
}

fn default_output_dir() -> String {
    ".".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            encrypted_api_key: None,
            salt: None,
            key_hash: None,
            default_output_dir: default_output_dir(),
            last_download_date: None,
        }
    }
}

/// Decoded credential material from a config record.
pub struct StoredCredential {
    pub sealed_key: Vec<u8>,
    pub salt: Vec<u8>,
    pub key_hash: Vec<u8>,
}

impl Config {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE)
    }

    /// Load the record from `dir`, or `None` if no config exists yet.
    pub fn load(dir: &Path) -> Result<Option<Config>> {
        let path = Self::path_in(dir);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(map_fs_err(e, &path)),
        };
        let config: Config = serde_json::from_str(&raw)?;
        config.check_credential_invariant()?;
        Ok(Some(config))
    }

    /// Write the record to `dir`, creating it if needed, and enforce the
    /// permission policy: directory 0700, file 0600.
    pub fn save(&self, dir: &Path) -> Result<()> {
        self.check_credential_invariant()?;
        fs::create_dir_all(dir).map_err(|e| map_fs_err(e, dir))?;
        restrict_dir_permissions(dir)?;

        let path = Self::path_in(dir);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| map_fs_err(e, &path))?;
        restrict_file_permissions(&path)?;
        Ok(())
    }

    /// True when a credential is stored (all three crypto fields set).
    pub fn has_credential(&self) -> bool {
        self.encrypted_api_key.is_some() && self.salt.is_some() && self.key_hash.is_some()
    }

    /// Decode the stored credential fields out of base64.
    ///
    /// Fails with `ConfigMissing` when no credential is stored and with
    /// `Integrity` when any field fails to decode.
    pub fn credential(&self) -> Result<StoredCredential> {
        self.check_credential_invariant()?;
        match (&self.encrypted_api_key, &self.salt, &self.key_hash) {
            (Some(sealed), Some(salt), Some(hash)) => Ok(StoredCredential {
                sealed_key: B64.decode(sealed).map_err(|_| EimgError::Integrity)?,
                salt: B64.decode(salt).map_err(|_| EimgError::Integrity)?,
                key_hash: B64.decode(hash).map_err(|_| EimgError::Integrity)?,
            }),
            _ => Err(EimgError::ConfigMissing),
        }
    }

    /// Set the credential fields from raw bytes, base64-encoding them.
    pub fn set_credential(&mut self, sealed_key: &[u8], salt: &[u8], key_hash: &[u8]) {
        self.encrypted_api_key = Some(B64.encode(sealed_key));
        self.salt = Some(B64.encode(salt));
        self.key_hash = Some(B64.encode(key_hash));
    }

    // All-or-none: a record with only some of the crypto fields has been
    // hand-edited or truncated.
    fn check_credential_invariant(&self) -> Result<()> {
        let present = [
            self.encrypted_api_key.is_some(),
            self.salt.is_some(),
            self.key_hash.is_some(),
        ];
        if present.iter().any(|&p| p) && !present.iter().all(|&p| p) {
            return Err(EimgError::Integrity);
        }
        Ok(())
    }
}

/// Securely destroy the config: overwrite the file content with random
/// bytes, fsync, unlink, then remove the directory. Calling this when no
/// config exists is a no-op.
pub fn wipe(dir: &Path) -> Result<()> {
    let path = Config::path_in(dir);
    match fs::metadata(&path) {
        Ok(meta) => {
            let overwrite_len = meta.len().max(1024) as usize;
            let mut noise = vec![0u8; overwrite_len];
            OsRng.fill_bytes(&mut noise);

            let mut file = fs::File::create(&path).map_err(|e| map_fs_err(e, &path))?;
            file.write_all(&noise).map_err(|e| map_fs_err(e, &path))?;
            file.sync_all().map_err(|e| map_fs_err(e, &path))?;
            drop(file);

            fs::remove_file(&path).map_err(|e| map_fs_err(e, &path))?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(map_fs_err(e, &path)),
    }

    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(map_fs_err(e, dir)),
    }
}

#[cfg(unix)]
fn restrict_dir_permissions(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
        .map_err(|e| map_fs_err(e, dir))
}

#[cfg(unix)]
fn restrict_file_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| map_fs_err(e, path))
}

#[cfg(not(unix))]
fn restrict_dir_permissions(_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn restrict_file_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn map_fs_err(e: std::io::Error, path: &Path) -> EimgError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        EimgError::Permission(path.to_path_buf())
    } else {
        EimgError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cfg");

        let mut config = Config::default();
        config.set_credential(b"sealed-bytes", b"salty-salty-1234", b"hash-bytes");
        config.last_download_date = NaiveDate::from_ymd_opt(2025, 6, 1);
        config.save(&dir).unwrap();

        let loaded = Config::load(&dir).unwrap().expect("config should exist");
        let cred = loaded.credential().unwrap();
        assert_eq!(cred.sealed_key, b"sealed-bytes");
        assert_eq!(cred.salt, b"salty-salty-1234");
        assert_eq!(cred.key_hash, b"hash-bytes");
        assert_eq!(loaded.last_download_date, NaiveDate::from_ymd_opt(2025, 6, 1));
    }

    #[test]
    fn missing_config_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        assert!(Config::load(&tmp.path().join("nope")).unwrap().is_none());
    }

    #[test]
    fn partial_credential_fields_are_corruption() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cfg");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            Config::path_in(&dir),
            r#"{"encrypted_api_key":"QUJD","default_output_dir":"."}"#,
        )
        .unwrap();

        assert!(matches!(Config::load(&dir), Err(EimgError::Integrity)));
    }

    #[test]
    fn credential_without_store_is_config_missing() {
        let config = Config::default();
        assert!(matches!(config.credential(), Err(EimgError::ConfigMissing)));
    }

    #[cfg(unix)]
    #[test]
    fn save_sets_restrictive_mode_bits() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cfg");
        Config::default().save(&dir).unwrap();

        let dir_mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        let file_mode = fs::metadata(Config::path_in(&dir))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
        assert_eq!(file_mode, 0o600);
    }

    #[test]
    fn wipe_removes_everything_and_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cfg");
        Config::default().save(&dir).unwrap();
        assert!(Config::path_in(&dir).exists());

        wipe(&dir).unwrap();
        assert!(!Config::path_in(&dir).exists());
        assert!(!dir.exists());

        // second call: no config, no error
        wipe(&dir).unwrap();
    }
}
