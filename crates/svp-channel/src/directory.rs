//! Public-key discovery.
//!
//! An identity's public key is the body of its `svp-deliveries` item. Peers
//! look it up there before sealing a delivery or opening one.

use svp_ledger::Ledger;
use svp_types::{AccountName, Permlink, Result, SvpError, constants};

use crate::keys::PublicKey;

/// Read and parse the public key announced by `identity`.
///
/// # Errors
/// - `UnknownIdentity` if the identity has no `svp-deliveries` item
/// - `InvalidPublicKey` if its body is not a hex-encoded key
/// - ledger read failures
pub async fn resolve_public_key(ledger: &dyn Ledger, identity: &AccountName) -> Result<PublicKey> {
    let deliveries = ledger
        .get_content(identity, &Permlink::new(constants::SVP_DELIVERIES_PERMLINK))
        .await?
        .ok_or_else(|| SvpError::UnknownIdentity(identity.clone()))?;

    let key = PublicKey::from_hex(&deliveries.body)?;
    tracing::debug!(identity = %identity, key = %key.short(), "Resolved public key");
    Ok(key)
}
