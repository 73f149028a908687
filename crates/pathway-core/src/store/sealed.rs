//! Encrypted on-disk session store.
//!
//! Each record is serialized to JSON and sealed with ChaCha20-Poly1305 under
//! a key derived from the session secret with Argon2id. The session id is
//! bound as associated data, so a sealed file renamed to another id fails to
//! open. File layout: `nonce (12 bytes) || ciphertext`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use tracing::debug;

use super::SessionStore;
use crate::auth::SessionRecord;

/// Application name used for the cache directory path
const APP_NAME: &str = "pathway";

/// Fixed salt for key derivation. The secret is the only varying input;
/// the salt just domain-separates this use of it.
const KEY_SALT: &[u8] = b"pathway-session-store";

const NONCE_LEN: usize = 12;

const FILE_EXTENSION: &str = "session";

pub struct SealedFileStore {
    dir: PathBuf,
    cipher: ChaCha20Poly1305,
}

impl SealedFileStore {
    pub fn new(dir: PathBuf, secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(anyhow!("session secret must not be empty"));
        }
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create session directory {}", dir.display()))?;

        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(secret.as_bytes(), KEY_SALT, &mut key)
            .map_err(|e| anyhow!("Failed to derive session key: {}", e))?;

        Ok(Self {
            dir,
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        })
    }

    /// `~/.cache/pathway/sessions` (platform equivalent)
    pub fn default_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("sessions"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a session id, or `None` if the id could not have been issued
    /// by us (keeps caller-supplied ids from escaping the directory).
    fn session_path(&self, id: &str) -> Option<PathBuf> {
        let well_formed = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        well_formed.then(|| self.dir.join(format!("{}.{}", id, FILE_EXTENSION)))
    }

    fn seal(&self, id: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: id.as_bytes(),
                },
            )
            .map_err(|_| anyhow!("Failed to seal session record"))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, id: &str, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(anyhow!("Sealed session file is truncated"));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: id.as_bytes(),
                },
            )
            .map_err(|_| anyhow!("Failed to open sealed session (wrong secret or corrupted file)"))
    }
}

impl SessionStore for SealedFileStore {
    fn load(&self, id: &str) -> Result<Option<SessionRecord>> {
        let Some(path) = self.session_path(id) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let sealed = std::fs::read(&path).context("Failed to read session file")?;
        let plaintext = self.open(id, &sealed)?;
        let record: SessionRecord =
            serde_json::from_slice(&plaintext).context("Failed to parse session record")?;
        Ok(Some(record))
    }

    fn save(&self, record: &SessionRecord) -> Result<()> {
        let path = self
            .session_path(record.id())
            .ok_or_else(|| anyhow!("Session id is not storable"))?;

        let plaintext = serde_json::to_vec(record)?;
        let sealed = self.seal(record.id(), &plaintext)?;

        // Write then rename so a concurrent reader never sees half a file
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, sealed).context("Failed to write session file")?;
        std::fs::rename(&tmp, &path).context("Failed to replace session file")?;
        debug!(path = %path.display(), "Session saved");
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<()> {
        if let Some(path) = self.session_path(id) {
            if path.exists() {
                std::fs::remove_file(path).context("Failed to remove session file")?;
            }
        }
        Ok(())
    }
}
