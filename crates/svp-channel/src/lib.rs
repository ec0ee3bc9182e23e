//! # svp-channel
//!
//! Confidential delivery for SVP. The ledger is public, so every payload a
//! seller hands to a buyer is boxed to the buyer's announced key.
//!
//! - [`Keypair`] / [`PublicKey`]: X25519 identity keys, hex on the wire
//! - [`SecureChannel`]: `encrypt_for` / `decrypt` with per-box random nonces
//! - [`resolve_public_key`]: key discovery via the `svp-deliveries` item

pub mod channel;
pub mod directory;
pub mod keys;

pub use channel::{Nonce, Sealed, SecureChannel};
pub use directory::resolve_public_key;
pub use keys::{Keypair, PublicKey};
