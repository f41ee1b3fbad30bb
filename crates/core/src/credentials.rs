//! Login credential resolution.
//!
//! A booking names its login either as a `[credentials]` profile or as a
//! sealed blob: standard base64 around a Fernet token whose plaintext is the
//! JSON pair `{"username": .., "password": ..}`.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use fernet::Fernet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::CredentialProfile;

/// Fernet keys are 32 raw bytes.
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Unknown credential profile '{0}'")]
    UnknownProfile(String),

    #[error("Credential profile '{0}' is incomplete")]
    Incomplete(String),

    #[error("Sealed credentials could not be opened: {0}")]
    Unsealable(String),

    #[error("Invalid credential encryption key")]
    InvalidKey,
}

/// A decrypted username/password pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Turns the opaque credentials reference of a booking into a usable pair.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<Credentials, CredentialError>;
}

/// Encrypts and decrypts credential blobs with a shared secret.
pub struct CredentialSealer {
    cipher: Fernet,
}

impl CredentialSealer {
    /// The secret is cut or padded with `'0'` to 32 bytes and used as the key.
    pub fn new(secret: &str) -> Result<Self, CredentialError> {
        let mut key = [b'0'; KEY_LEN];
        let bytes = secret.as_bytes();
        let len = bytes.len().min(KEY_LEN);
        key[..len].copy_from_slice(&bytes[..len]);

        let cipher = Fernet::new(&URL_SAFE.encode(key)).ok_or(CredentialError::InvalidKey)?;
        Ok(Self { cipher })
    }

    pub fn seal(&self, credentials: &Credentials) -> Result<String, CredentialError> {
        let plain = serde_json::to_vec(credentials)
            .map_err(|e| CredentialError::Unsealable(e.to_string()))?;
        let token = self.cipher.encrypt(&plain);
        Ok(STANDARD.encode(token.as_bytes()))
    }

    pub fn open(&self, blob: &str) -> Result<Credentials, CredentialError> {
        let token = STANDARD
            .decode(blob.trim())
            .map_err(|_| CredentialError::Unsealable("not base64".to_string()))?;
        let token = String::from_utf8(token)
            .map_err(|_| CredentialError::Unsealable("malformed token".to_string()))?;
        let plain = self
            .cipher
            .decrypt(&token)
            .map_err(|_| CredentialError::Unsealable("wrong key or tampered token".to_string()))?;
        serde_json::from_slice(&plain).map_err(|e| CredentialError::Unsealable(e.to_string()))
    }
}

/// Resolves named profiles from the `[credentials]` config section, and
/// sealed blobs when a sealer is attached.
pub struct ConfigCredentialProvider {
    profiles: BTreeMap<String, CredentialProfile>,
    sealer: Option<CredentialSealer>,
}

impl ConfigCredentialProvider {
    pub fn new(profiles: BTreeMap<String, CredentialProfile>) -> Self {
        Self {
            profiles,
            sealer: None,
        }
    }

    pub fn with_sealer(mut self, sealer: CredentialSealer) -> Self {
        self.sealer = Some(sealer);
        self
    }
}

#[async_trait]
impl CredentialProvider for ConfigCredentialProvider {
    async fn resolve(&self, reference: &str) -> Result<Credentials, CredentialError> {
        let Some(profile) = self.profiles.get(reference) else {
            return match self.sealer {
                Some(ref sealer) => {
                    debug!("Opening sealed credentials");
                    let credentials = sealer.open(reference)?;
                    if credentials.username.is_empty() || credentials.password.is_empty() {
                        return Err(CredentialError::Unsealable(
                            "empty username or password".to_string(),
                        ));
                    }
                    Ok(credentials)
                }
                None => Err(CredentialError::UnknownProfile(reference.to_string())),
            };
        };

        if profile.username.is_empty() || profile.password.is_empty() {
            return Err(CredentialError::Incomplete(reference.to_string()));
        }

        Ok(Credentials {
            username: profile.username.clone(),
            password: profile.password.clone(),
        })
    }
}
