//! Session signing
//!
//! A session can carry two kinds of keys: an external capability (hardware or
//! browser wallet integration living outside this crate) and a local session
//! keypair persisted on disk. When both are present the external key signs;
//! the local key is only a fallback, never an implicit second signer.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};
use tracing::{info, warn};

use crate::error::{EngineError, Result};

/// Opaque signing capability: an identity and the ability to sign message bytes
pub trait TransactionSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;
    fn sign_message_bytes(&self, message: &[u8]) -> Result<Signature>;
}

impl TransactionSigner for Keypair {
    fn pubkey(&self) -> Pubkey {
        Signer::pubkey(self)
    }

    fn sign_message_bytes(&self, message: &[u8]) -> Result<Signature> {
        Ok(self.sign_message(message))
    }
}

/// The keys attached to a session, external preferred over local
#[derive(Default)]
pub struct SignerStack {
    external: Option<Arc<dyn TransactionSigner>>,
    local: Option<Keypair>,
}

impl SignerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_external(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.external = Some(signer);
        self
    }

    pub fn with_local(mut self, keypair: Keypair) -> Self {
        self.local = Some(keypair);
        self
    }

    pub fn set_external(&mut self, signer: Arc<dyn TransactionSigner>) {
        self.external = Some(signer);
    }

    pub fn set_local(&mut self, keypair: Keypair) {
        self.local = Some(keypair);
    }

    pub fn has_signer(&self) -> bool {
        self.external.is_some() || self.local.is_some()
    }

    /// Which key would sign now: "external" or "local"
    pub fn active_kind(&self) -> Option<&'static str> {
        if self.external.is_some() {
            Some("external")
        } else if self.local.is_some() {
            Some("local")
        } else {
            None
        }
    }

    /// Public key of the signing identity
    pub fn identity(&self) -> Result<Pubkey> {
        if let Some(external) = &self.external {
            return Ok(external.pubkey());
        }
        if let Some(local) = &self.local {
            return Ok(Signer::pubkey(local));
        }
        Err(EngineError::NoSigner)
    }

    /// Sign raw message bytes with the active key
    pub fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        if let Some(external) = &self.external {
            return external.sign_message_bytes(message);
        }
        if let Some(local) = &self.local {
            return Ok(local.sign_message(message));
        }
        Err(EngineError::NoSigner)
    }

    /// Sign the transaction in place and return the signature
    pub fn sign_transaction(&self, transaction: &mut Transaction) -> Result<Signature> {
        let identity = self.identity()?;
        let message = transaction.message_data();
        let signature = self.sign_message(&message)?;

        let required = transaction.message.header.num_required_signatures as usize;
        let index = transaction
            .message
            .account_keys
            .iter()
            .take(required)
            .position(|key| *key == identity)
            .ok_or_else(|| {
                EngineError::SigningUnavailable(format!(
                    "{} is not a required signer of this transaction",
                    identity
                ))
            })?;

        transaction.signatures[index] = signature;
        Ok(signature)
    }
}

/// Load the session keypair from disk, generating and persisting a fresh one
/// when the file is missing or unreadable. The file holds the 64 secret-key
/// bytes as a JSON array.
pub fn load_or_create_session_keypair(path: &Path) -> Result<Keypair> {
    if let Ok(raw) = fs::read_to_string(path) {
        match parse_keypair_json(&raw) {
            Ok(keypair) => {
                info!(
                    "Loaded session keypair {} from {}",
                    Signer::pubkey(&keypair),
                    path.display()
                );
                return Ok(keypair);
            }
            Err(err) => {
                warn!(
                    "Session keypair at {} unreadable ({}), regenerating",
                    path.display(),
                    err
                );
            }
        }
    }

    let keypair = Keypair::new();
    store_session_keypair(path, &keypair)?;
    info!(
        "Generated new session keypair {} at {}",
        Signer::pubkey(&keypair),
        path.display()
    );
    Ok(keypair)
}

/// Persist the session keypair as a JSON byte array
pub fn store_session_keypair(path: &Path, keypair: &Keypair) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| EngineError::KeyStore(format!("create {}: {}", parent.display(), e)))?;
        }
    }
    let encoded = serde_json::to_string(&keypair.to_bytes().to_vec())
        .map_err(|e| EngineError::KeyStore(format!("encode session key: {}", e)))?;
    fs::write(path, encoded)
        .map_err(|e| EngineError::KeyStore(format!("write {}: {}", path.display(), e)))
}

fn parse_keypair_json(raw: &str) -> Result<Keypair> {
    let bytes: Vec<u8> = serde_json::from_str(raw)
        .map_err(|e| EngineError::KeyStore(format!("invalid key file: {}", e)))?;
    Keypair::from_bytes(&bytes)
        .map_err(|e| EngineError::KeyStore(format!("invalid secret key bytes: {}", e)))
}

/// Parse a secret key from its common text encodings: JSON byte array,
/// base58, or base64
pub fn keypair_from_encoded(encoded: &str) -> Result<Keypair> {
    let trimmed = encoded.trim();
    if trimmed.starts_with('[') {
        return parse_keypair_json(trimmed);
    }

    if let Ok(bytes) = bs58::decode(trimmed).into_vec() {
        if let Ok(keypair) = Keypair::from_bytes(&bytes) {
            return Ok(keypair);
        }
    }

    let bytes = general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| EngineError::KeyStore(format!("secret key is not base58 or base64: {}", e)))?;
    Keypair::from_bytes(&bytes)
        .map_err(|e| EngineError::KeyStore(format!("invalid secret key bytes: {}", e)))
}

/// Base64-encode a transaction for transport to an external signer
pub fn serialize_transaction(transaction: &Transaction) -> Result<String> {
    let bytes = bincode::serialize(transaction)
        .map_err(|e| EngineError::SigningUnavailable(format!("serialize transaction: {}", e)))?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

/// Decode a transaction previously encoded with [`serialize_transaction`]
pub fn deserialize_transaction(encoded: &str) -> Result<Transaction> {
    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| EngineError::SigningUnavailable(format!("decode transaction: {}", e)))?;
    bincode::deserialize(&bytes)
        .map_err(|e| EngineError::SigningUnavailable(format!("deserialize transaction: {}", e)))
}
