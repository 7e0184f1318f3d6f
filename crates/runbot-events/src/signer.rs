use secp256k1::{schnorr::Signature, Keypair, Message, XOnlyPublicKey, SECP256K1};
use thiserror::Error;

use crate::{compute_event_id, Event, UnsignedEvent};

#[derive(Debug, Error)]
/// Enumerates supported `SigningError` values.
pub enum SigningError {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("event id does not match its canonical digest")]
    IdMismatch,
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

/// Turns an unsigned draft into a fully populated signed event.
pub trait EventSigner: Send + Sync {
    fn public_key_hex(&self) -> &str;

    fn sign(&self, draft: UnsignedEvent) -> Result<Event, SigningError>;
}

#[derive(Clone)]
/// BIP-340 Schnorr signer over secp256k1, the scheme relays verify.
///
/// The public key is the 32-byte x-only key and the signature covers the raw
/// event id. Signing uses no auxiliary randomness, so equal drafts produce
/// equal events.
pub struct Secp256k1SchnorrSigner {
    keypair: Keypair,
    public_key_hex: String,
}

impl std::fmt::Debug for Secp256k1SchnorrSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secp256k1SchnorrSigner")
            .field("public_key_hex", &self.public_key_hex)
            .finish_non_exhaustive()
    }
}

impl Secp256k1SchnorrSigner {
    /// Fails when `secret` is zero or not below the curve order.
    pub fn from_bytes(secret: &[u8; 32]) -> Result<Self, SigningError> {
        let keypair = Keypair::from_seckey_slice(SECP256K1, secret)
            .map_err(|error| SigningError::InvalidSecretKey(error.to_string()))?;
        let (public_key, _parity) = keypair.x_only_public_key();
        Ok(Self {
            keypair,
            public_key_hex: hex::encode(public_key.serialize()),
        })
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, SigningError> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|error| SigningError::InvalidSecretKey(error.to_string()))?;
        let secret: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            SigningError::InvalidSecretKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Self::from_bytes(&secret)
    }
}

impl EventSigner for Secp256k1SchnorrSigner {
    fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    fn sign(&self, draft: UnsignedEvent) -> Result<Event, SigningError> {
        let id = compute_event_id(
            &self.public_key_hex,
            draft.created_at,
            draft.kind,
            &draft.tags,
            &draft.content,
        );
        let message = id_message(&id)?;
        let signature = SECP256K1.sign_schnorr_no_aux_rand(&message, &self.keypair);
        Ok(Event {
            id,
            pubkey: self.public_key_hex.clone(),
            created_at: draft.created_at,
            kind: draft.kind,
            tags: draft.tags,
            content: draft.content,
            sig: hex::encode(signature.serialize()),
        })
    }
}

fn id_message(id: &str) -> Result<Message, SigningError> {
    let digest: [u8; 32] = hex::decode(id)
        .map_err(|error| SigningError::InvalidSignature(error.to_string()))?
        .try_into()
        .map_err(|_| SigningError::InvalidSignature("event id must be 32 bytes".to_string()))?;
    Ok(Message::from_digest(digest))
}

/// Checks the canonical id and the Schnorr signature carried by `event`.
pub fn verify_event_signature(event: &Event) -> Result<(), SigningError> {
    if !event.has_valid_id() {
        return Err(SigningError::IdMismatch);
    }
    let public_key_bytes = hex::decode(&event.pubkey)
        .map_err(|error| SigningError::InvalidPublicKey(error.to_string()))?;
    let public_key = XOnlyPublicKey::from_slice(&public_key_bytes)
        .map_err(|error| SigningError::InvalidPublicKey(error.to_string()))?;
    let signature_bytes = hex::decode(&event.sig)
        .map_err(|error| SigningError::InvalidSignature(error.to_string()))?;
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|error| SigningError::InvalidSignature(error.to_string()))?;
    let message = id_message(&event.id)?;
    SECP256K1
        .verify_schnorr(&signature, &message, &public_key)
        .map_err(|error| SigningError::InvalidSignature(error.to_string()))
}
