//! Envelope encryption for PSP credentials and client secrets.
//!
//! Values are stored as `nonce:tag:ciphertext`, each part hex-encoded.
//! AES-256-GCM with a 96-bit random nonce and 128-bit auth tag.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use serde_json::Value;

use crate::error::CoreError;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Clone)]
pub struct CredentialVault {
    key: Key<Aes256Gcm>,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialVault([REDACTED])")
    }
}

impl CredentialVault {
    /// Build the vault from a 64-hex-char (32-byte) key. A missing or
    /// malformed key is a startup failure, not a per-call error.
    pub fn from_hex_key(raw: &str) -> anyhow::Result<Self> {
        let trimmed = raw.trim();
        if trimmed.len() != 64 {
            anyhow::bail!("ENCRYPTION_KEY must be a 32-byte hex string (64 chars)");
        }
        let bytes = hex::decode(trimmed)?;
        let key = Key::<Aes256Gcm>::clone_from_slice(&bytes);
        Ok(Self { key })
    }

    pub fn encrypt(&self, plain: &str) -> Result<String, CoreError> {
        if plain.is_empty() {
            return Ok(String::new());
        }
        // never double-encrypt an already-enveloped value
        if is_ciphertext_shaped(plain) {
            return Ok(plain.to_string());
        }
        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher
            .encrypt(&nonce, plain.as_bytes())
            .map_err(|_| CoreError::Decryption("encryption failed".to_string()))?;
        // aes-gcm appends the tag to the ciphertext; split it back out
        let (ct, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        Ok(format!(
            "{}:{}:{}",
            hex::encode(nonce),
            hex::encode(tag),
            hex::encode(ct)
        ))
    }

    pub fn decrypt(&self, payload: &str) -> Result<String, CoreError> {
        if payload.is_empty() {
            return Ok(String::new());
        }
        let parts: Vec<&str> = payload.split(':').collect();
        if parts.len() != 3 {
            return Err(CoreError::Decryption("invalid encrypted payload".to_string()));
        }
        let nonce_bytes = hex::decode(parts[0])
            .map_err(|_| CoreError::Decryption("invalid nonce encoding".to_string()))?;
        let tag = hex::decode(parts[1])
            .map_err(|_| CoreError::Decryption("invalid tag encoding".to_string()))?;
        let ct = hex::decode(parts[2])
            .map_err(|_| CoreError::Decryption("invalid ciphertext encoding".to_string()))?;
        if nonce_bytes.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return Err(CoreError::Decryption("invalid encrypted payload".to_string()));
        }

        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let mut sealed = ct;
        sealed.extend_from_slice(&tag);
        let plain = cipher
            .decrypt(nonce, sealed.as_ref())
            .map_err(|_| CoreError::Decryption("auth tag mismatch or corrupted data".to_string()))?;
        String::from_utf8(plain)
            .map_err(|_| CoreError::Decryption("decrypted value is not utf-8".to_string()))
    }

    /// Encrypt every string leaf of a JSON value in place, so credential
    /// objects can be stored as a single opaque blob.
    pub fn encrypt_object(&self, value: &Value) -> Result<Value, CoreError> {
        self.map_strings(value, &|s| self.encrypt(s))
    }

    pub fn decrypt_object(&self, value: &Value) -> Result<Value, CoreError> {
        self.map_strings(value, &|s| self.decrypt(s))
    }

    fn map_strings(
        &self,
        value: &Value,
        f: &dyn Fn(&str) -> Result<String, CoreError>,
    ) -> Result<Value, CoreError> {
        match value {
            Value::String(s) => Ok(Value::String(f(s)?)),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.map_strings(v, f)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for v in items {
                    out.push(self.map_strings(v, f)?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other.clone()),
        }
    }
}

/// Whether `value` already matches the `nonce:tag:ciphertext` hex format.
pub fn is_ciphertext_shaped(value: &str) -> bool {
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() != 3 {
        return false;
    }
    let hex_ok = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit());
    parts[0].len() == NONCE_LEN * 2 && parts[1].len() == TAG_LEN * 2 && parts.iter().all(|p| hex_ok(p))
}
