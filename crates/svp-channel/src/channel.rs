//! # SecureChannel — confidential deliveries over a public ledger
//!
//! A delivery is a box: authenticated encryption keyed by the X25519 shared
//! secret of (own secret, peer public). Both sides derive the same key, so
//! the seller seals with `(seller secret, buyer public)` and the buyer opens
//! with `(buyer secret, seller public)`.
//!
//! ```text
//!   shared = X25519(own_secret, peer_public)
//!   key    = SHA-256("svp:box:v1:" || shared)
//!   box    = XChaCha20-Poly1305(key, nonce[24], plaintext)
//! ```
//!
//! The 24-byte nonce is random per box. It travels as the delivery's
//! permlink (hex), which also makes it the reply-routing key: unique and
//! unpredictable.

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use svp_types::{Result, SvpError};

use crate::keys::{Keypair, PublicKey};

/// Domain separator for the box key derivation.
const BOX_KDF_DOMAIN: &[u8] = b"svp:box:v1:";

// ---------------------------------------------------------------------------
// Nonce
// ---------------------------------------------------------------------------

/// A 192-bit box nonce.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce(pub [u8; 24]);

impl Nonce {
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 24];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// # Errors
    /// Returns `InvalidPublicKey` unless `s` is exactly 24 hex-encoded bytes.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| SvpError::InvalidPublicKey {
            reason: format!("nonce: {e}"),
        })?;
        let bytes: [u8; 24] = bytes.try_into().map_err(|b: Vec<u8>| SvpError::InvalidPublicKey {
            reason: format!("nonce: expected 24 bytes, got {}", b.len()),
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self.to_hex())
    }
}

/// Output of [`SecureChannel::encrypt_for`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: Nonce,
}

// ---------------------------------------------------------------------------
// SecureChannel
// ---------------------------------------------------------------------------

/// Encrypts to and decrypts from other identities with this identity's keys.
#[derive(Debug, Clone)]
pub struct SecureChannel {
    keypair: Keypair,
}

impl SecureChannel {
    #[must_use]
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Seal `plaintext` for `recipient` under a fresh random nonce.
    ///
    /// # Errors
    /// Returns `EncryptionFailed` if the key exchange is non-contributory
    /// (low-order recipient key) or the cipher fails.
    pub fn encrypt_for(&self, recipient: &PublicKey, plaintext: &[u8]) -> Result<Sealed> {
        let cipher = self.cipher_with(recipient).ok_or_else(|| SvpError::EncryptionFailed {
            reason: format!("non-contributory key exchange with {}", recipient.short()),
        })?;
        let nonce = Nonce::generate();
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| SvpError::EncryptionFailed {
                reason: e.to_string(),
            })?;
        Ok(Sealed { ciphertext, nonce })
    }

    /// Open a box sealed by `sender` for this identity.
    ///
    /// # Errors
    /// Returns `AuthenticationFailure` for a wrong key, wrong nonce or
    /// tampered ciphertext.
    pub fn decrypt(&self, sender: &PublicKey, nonce: &Nonce, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let cipher = self.cipher_with(sender).ok_or(SvpError::AuthenticationFailure)?;
        cipher
            .decrypt(XNonce::from_slice(&nonce.0), ciphertext)
            .map_err(|_| SvpError::AuthenticationFailure)
    }

    fn cipher_with(&self, peer: &PublicKey) -> Option<XChaCha20Poly1305> {
        let shared = self.keypair.secret().diffie_hellman(&peer.0);
        if !shared.was_contributory() {
            return None;
        }
        let mut hasher = Sha256::new();
        hasher.update(BOX_KDF_DOMAIN);
        hasher.update(shared.as_bytes());
        let key = hasher.finalize();
        Some(XChaCha20Poly1305::new(&key))
    }
}
