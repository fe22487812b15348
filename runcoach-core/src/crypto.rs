//! Symmetric encryption for credentials at rest.
//!
//! Blobs are laid out as `version (1) || nonce (12) || ciphertext + tag`
//! and sealed with AES-256-GCM. A wrong key and a tampered file both fail
//! authentication and surface as [`StoreError::Corrupted`].

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use zeroize::Zeroizing;

use crate::store::{StoreError, write_temp_file};

/// Length of a raw key on disk.
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const FORMAT_VERSION: u8 = 1;

/// An AES-256-GCM key loaded from disk.
pub struct EncryptionKey {
    cipher: Aes256Gcm,
}

impl EncryptionKey {
    /// Load the key at `path`, generating and writing a new one if absent.
    ///
    /// A new key is written to an owner-only temp file and hard-linked into
    /// place. The link fails if a key already exists, so concurrent openers
    /// all end up with the first key published and never see a partial file.
    pub fn load_or_create(path: &Path) -> Result<Self, StoreError> {
        match fs::read(path) {
            Ok(bytes) => return Self::from_bytes(&Zeroizing::new(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let key = Aes256Gcm::generate_key(OsRng);
        let tmp = write_temp_file(path, key.as_slice())?;
        let published = fs::hard_link(&tmp, path);
        let _ = fs::remove_file(&tmp);

        match published {
            Ok(()) => tracing::info!("Generated new encryption key at {}", path.display()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!("Encryption key at {} was created concurrently", path.display());
            }
            Err(e) => return Err(e.into()),
        }

        let bytes = Zeroizing::new(fs::read(path)?);
        Self::from_bytes(&bytes)
    }

    /// Build a key from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() != KEY_LEN {
            return Err(StoreError::InvalidKey {
                message: format!("expected {} bytes, found {}", KEY_LEN, bytes.len()),
            });
        }

        let cipher = Aes256Gcm::new_from_slice(bytes).map_err(|e| StoreError::InvalidKey {
            message: e.to_string(),
        })?;

        Ok(Self { cipher })
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, StoreError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| StoreError::Encryption {
                message: e.to_string(),
            })?;

        let mut blob = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        blob.push(FORMAT_VERSION);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>, StoreError> {
        if blob.len() < 1 + NONCE_LEN + TAG_LEN {
            return Err(StoreError::Corrupted {
                message: "encrypted data too short".to_string(),
            });
        }

        if blob[0] != FORMAT_VERSION {
            return Err(StoreError::Corrupted {
                message: format!("unknown format version {}", blob[0]),
            });
        }

        let nonce = Nonce::from_slice(&blob[1..1 + NONCE_LEN]);
        let plaintext = self
            .cipher
            .decrypt(nonce, &blob[1 + NONCE_LEN..])
            .map_err(|_| StoreError::Corrupted {
                message: "decryption failed (wrong key or tampered data)".to_string(),
            })?;

        Ok(Zeroizing::new(plaintext))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encrypt_decrypt() {
        let key = EncryptionKey::from_bytes(&[7u8; KEY_LEN]).unwrap();
        let blob = key.encrypt(b"hello").unwrap();

        assert_eq!(blob[0], FORMAT_VERSION);
        assert_eq!(blob.len(), 1 + NONCE_LEN + 5 + TAG_LEN);
        assert_eq!(key.decrypt(&blob).unwrap().as_slice(), b"hello");
    }

    #[test]
    fn test_nonce_differs_per_call() {
        let key = EncryptionKey::from_bytes(&[1u8; KEY_LEN]).unwrap();
        let a = key.encrypt(b"same").unwrap();
        let b = key.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_is_corruption() {
        let key = EncryptionKey::from_bytes(&[1u8; KEY_LEN]).unwrap();
        let other = EncryptionKey::from_bytes(&[2u8; KEY_LEN]).unwrap();
        let blob = key.encrypt(b"secret").unwrap();

        assert!(matches!(
            other.decrypt(&blob),
            Err(StoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn test_tampered_blob_is_corruption() {
        let key = EncryptionKey::from_bytes(&[3u8; KEY_LEN]).unwrap();
        let mut blob = key.encrypt(b"secret").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;

        assert!(matches!(key.decrypt(&blob), Err(StoreError::Corrupted { .. })));
        assert!(matches!(key.decrypt(&blob[..8]), Err(StoreError::Corrupted { .. })));
    }

    #[test]
    fn test_unknown_version_is_corruption() {
        let key = EncryptionKey::from_bytes(&[3u8; KEY_LEN]).unwrap();
        let mut blob = key.encrypt(b"secret").unwrap();
        blob[0] = 9;

        assert!(matches!(key.decrypt(&blob), Err(StoreError::Corrupted { .. })));
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(matches!(
            EncryptionKey::from_bytes(&[0u8; 16]),
            Err(StoreError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_load_or_create_reuses_existing_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".key");

        let first = EncryptionKey::load_or_create(&path).unwrap();
        let on_disk = fs::read(&path).unwrap();
        assert_eq!(on_disk.len(), KEY_LEN);

        let blob = first.encrypt(b"payload").unwrap();
        let second = EncryptionKey::load_or_create(&path).unwrap();
        assert_eq!(second.decrypt(&blob).unwrap().as_slice(), b"payload");
        assert_eq!(fs::read(&path).unwrap(), on_disk);
    }

    #[test]
    fn test_concurrent_creation_agrees_on_one_key() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        for _ in 0..50 {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join(".key");
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = (0..2)
                .map(|i| {
                    let path = path.clone();
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        let key = EncryptionKey::load_or_create(&path).unwrap();
                        key.encrypt(format!("record-{i}").as_bytes()).unwrap()
                    })
                })
                .collect();

            let blobs: Vec<Vec<u8>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            let reopened = EncryptionKey::load_or_create(&path).unwrap();
            for (i, blob) in blobs.iter().enumerate() {
                let plaintext = reopened.decrypt(blob).unwrap();
                assert_eq!(plaintext.as_slice(), format!("record-{i}").as_bytes());
            }

            let leftovers = fs::read_dir(dir.path()).unwrap().count();
            assert_eq!(leftovers, 1, "only the key file should remain");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".key");
        EncryptionKey::load_or_create(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
