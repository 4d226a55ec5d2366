use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{KEYPAIR_LENGTH, SECRET_KEY_LENGTH, Signer as _, SigningKey};
use rand::rngs::OsRng;
use rpcbench_core::KeySource;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("failed to read key file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write key file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key file {} is not valid base64: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: base64::DecodeError,
    },

    #[error(
        "key file {} holds {len} bytes; expected a 32-byte seed or a 64-byte keypair",
        .path.display()
    )]
    Length { path: PathBuf, len: usize },

    #[error("key file {} holds a keypair whose public half does not match", .path.display())]
    Mismatch { path: PathBuf },
}

/// ed25519 signing identity of one worker.
pub struct Signer {
    key: SigningKey,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

impl Signer {
    /// Fresh ephemeral identity.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn load(source: &KeySource) -> Result<Self, KeyError> {
        match source {
            KeySource::Generate => Ok(Self::generate()),
            KeySource::File(path) => Self::from_key_file(path),
        }
    }

    /// Reads a base64 key: a 32-byte seed or a 64-byte `seed || public key` pair.
    pub fn from_key_file(path: &Path) -> Result<Self, KeyError> {
        let raw = std::fs::read_to_string(path).map_err(|source| KeyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let bytes = STANDARD
            .decode(raw.trim())
            .map_err(|source| KeyError::Decode {
                path: path.to_path_buf(),
                source,
            })?;

        match bytes.len() {
            SECRET_KEY_LENGTH => {
                let mut seed = [0u8; SECRET_KEY_LENGTH];
                seed.copy_from_slice(&bytes);
                Ok(Self {
                    key: SigningKey::from_bytes(&seed),
                })
            }
            KEYPAIR_LENGTH => {
                let mut pair = [0u8; KEYPAIR_LENGTH];
                pair.copy_from_slice(&bytes);
                let key = SigningKey::from_keypair_bytes(&pair).map_err(|_| KeyError::Mismatch {
                    path: path.to_path_buf(),
                })?;
                Ok(Self { key })
            }
            len => Err(KeyError::Length {
                path: path.to_path_buf(),
                len,
            }),
        }
    }

    #[must_use]
    pub fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    #[must_use]
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    #[must_use]
    pub fn sign(&self, msg: &[u8]) -> [u8; 64] {
        self.key.sign(msg).to_bytes()
    }

    /// Base64 of the 64-byte keypair, the format [`Signer::from_key_file`] reads.
    #[must_use]
    pub fn encode_keypair(&self) -> String {
        STANDARD.encode(self.key.to_keypair_bytes())
    }
}

/// Generates a new identity and writes it to `path`.
pub fn generate_key_file(path: &Path) -> Result<Signer, KeyError> {
    let signer = Signer::generate();
    std::fs::write(path, signer.encode_keypair()).map_err(|source| KeyError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(
        path = %path.display(),
        public_key = %signer.public_key_hex(),
        "wrote key file"
    );
    Ok(signer)
}
