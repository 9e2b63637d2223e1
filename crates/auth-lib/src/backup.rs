// ============================
// crates/auth-lib/src/backup.rs
// ============================
//! Encrypted, integrity-checked user snapshots for credential
//! migrations.
//!
//! This is offline tooling, not part of the live request path. The
//! default policy is secure-by-default: password digests are stripped
//! from every snapshot unless explicitly included, and backups are
//! encrypted with AES-256-GCM under a key the system never retains.
//! The envelope stores the nonce next to the ciphertext
//! (`base64(nonce):base64(ciphertext)`), never the key.

use std::path::Path;

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    AeadCore, Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AuthError, AuthResult};
use authgate_common::UserRecord;

/// Version of the backup envelope layout
pub const BACKUP_SCHEMA_VERSION: u32 = 1;

const KEY_BYTES: usize = 32;

/// Backup envelope metadata
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub timestamp: DateTime<Utc>,
    pub schema_version: u32,
    pub encrypted: bool,
    pub includes_secrets: bool,
    /// Must equal the length of the snapshot sequence; a mismatch
    /// marks the backup as corrupt
    pub record_count: usize,
}

/// Snapshot payload: either sanitized records in the clear or an
/// encrypted envelope
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum BackupPayload {
    /// `base64(nonce):base64(ciphertext)`
    Encrypted(String),
    Plain(Vec<serde_json::Value>),
}

/// A complete backup
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub metadata: BackupMetadata,
    pub payload: BackupPayload,
}

/// Backup creation options
#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub encrypt: bool,
    /// Keep password digests in the snapshots. Off by default: this
    /// tooling exists precisely to migrate password storage.
    pub include_secrets: bool,
    /// Encryption key; a random one is generated when absent
    pub key: Option<[u8; KEY_BYTES]>,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            encrypt: true,
            include_secrets: false,
            key: None,
        }
    }
}

/// Result of creating a backup. `generated_key` is surfaced here
/// exactly once; the system keeps no copy.
#[derive(Debug)]
pub struct BackupHandle {
    pub backup: Backup,
    /// Base64 key, present only when the key was generated
    pub generated_key: Option<String>,
}

fn sanitize(record: &UserRecord, include_secrets: bool) -> AuthResult<serde_json::Value> {
    let mut value = serde_json::to_value(record)?;
    if !include_secrets {
        if let Some(map) = value.as_object_mut() {
            map.remove("passwordHash");
            map.remove("password");
        }
    }
    Ok(value)
}

/// Create a backup of the given user records
pub fn create_backup(records: &[UserRecord], options: &BackupOptions) -> AuthResult<BackupHandle> {
    let snapshots = records
        .iter()
        .map(|record| sanitize(record, options.include_secrets))
        .collect::<AuthResult<Vec<_>>>()?;

    let metadata = BackupMetadata {
        timestamp: Utc::now(),
        schema_version: BACKUP_SCHEMA_VERSION,
        encrypted: options.encrypt,
        includes_secrets: options.include_secrets,
        record_count: snapshots.len(),
    };

    if !options.encrypt {
        return Ok(BackupHandle {
            backup: Backup {
                metadata,
                payload: BackupPayload::Plain(snapshots),
            },
            generated_key: None,
        });
    }

    let (key_bytes, generated_key) = match options.key {
        Some(key) => (Key::<Aes256Gcm>::from(key), None),
        None => {
            let key = Aes256Gcm::generate_key(&mut OsRng);
            let encoded = STANDARD.encode(key);
            warn!(
                "generated a one-time backup encryption key; it is required for restoration and is NOT retained anywhere"
            );
            (key, Some(encoded))
        },
    };

    let cipher = Aes256Gcm::new(&key_bytes);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let plaintext = serde_json::to_vec(&snapshots)?;
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_slice())
        .map_err(|_| AuthError::Crypto("backup encryption failed".to_string()))?;

    let envelope = format!("{}:{}", STANDARD.encode(nonce), STANDARD.encode(ciphertext));

    Ok(BackupHandle {
        backup: Backup {
            metadata,
            payload: BackupPayload::Encrypted(envelope),
        },
        generated_key,
    })
}

/// Restore the snapshot sequence from a backup.
///
/// Fails with `DecryptionKeyRequired` when the backup is encrypted
/// and no key is supplied, and `IntegrityViolation` when the payload
/// fails authentication or the declared record count does not match
/// the decoded sequence.
pub fn restore_backup(
    backup: &Backup,
    key: Option<&[u8; KEY_BYTES]>,
) -> AuthResult<Vec<serde_json::Value>> {
    let snapshots = match &backup.payload {
        BackupPayload::Plain(snapshots) => snapshots.clone(),
        BackupPayload::Encrypted(envelope) => {
            let Some(key) = key else {
                return Err(AuthError::DecryptionKeyRequired);
            };

            let (nonce_b64, ciphertext_b64) = envelope
                .split_once(':')
                .ok_or(AuthError::IntegrityViolation)?;
            let nonce_bytes = STANDARD
                .decode(nonce_b64)
                .map_err(|_| AuthError::IntegrityViolation)?;
            let ciphertext = STANDARD
                .decode(ciphertext_b64)
                .map_err(|_| AuthError::IntegrityViolation)?;
            if nonce_bytes.len() != 12 {
                return Err(AuthError::IntegrityViolation);
            }

            let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
            let plaintext = cipher
                .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
                .map_err(|_| AuthError::IntegrityViolation)?;

            serde_json::from_slice(&plaintext).map_err(|_| AuthError::IntegrityViolation)?
        },
    };

    if snapshots.len() != backup.metadata.record_count {
        return Err(AuthError::IntegrityViolation);
    }

    Ok(snapshots)
}

/// Decode a base64 key produced by `create_backup`
pub fn decode_key(encoded: &str) -> AuthResult<[u8; KEY_BYTES]> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthError::Crypto("backup key is not valid base64".to_string()))?;
    bytes
        .try_into()
        .map_err(|_| AuthError::Crypto("backup key must be 32 bytes".to_string()))
}

/// Write a backup to disk as JSON
pub fn save_backup(path: &Path, backup: &Backup) -> AuthResult<()> {
    let json = serde_json::to_vec_pretty(backup)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read a backup from disk
pub fn load_backup(path: &Path) -> AuthResult<Backup> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
