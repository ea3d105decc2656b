// 3.1: Order signatures
//
// Orders reach the engine through relayers, so the trader's authorization
// travels with the order as a keyed digest over its hash. The scheme byte
// picks the digest construction; anything unrecognized is rejected before
// any balance is touched.

use crate::types::{OrderHash, UserId};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Prefix mixed into [`SignScheme::Prefixed`] digests, so a digest produced
/// for one scheme never verifies under the other.
const PREFIX: &[u8] = b"\x19margin-core signed order:\n32";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("unknown signature scheme 0x{0:02x}")]
    InvalidSignMethod(u8),

    #[error("no signing key registered for {0}")]
    UnknownSigner(UserId),

    #[error("signature does not match order hash for {trader}")]
    BadSignature { trader: UserId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignScheme {
    /// Digest over the raw order hash
    Direct,
    /// Digest over a domain-prefixed order hash
    Prefixed,
}

impl SignScheme {
    pub fn from_byte(byte: u8) -> Result<Self, SignatureError> {
        match byte {
            0x00 => Ok(SignScheme::Direct),
            0x01 => Ok(SignScheme::Prefixed),
            other => Err(SignatureError::InvalidSignMethod(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            SignScheme::Direct => 0x00,
            SignScheme::Prefixed => 0x01,
        }
    }
}

/// Signature as submitted alongside an order. The scheme byte is kept raw
/// so an unknown value surfaces as [`SignatureError::InvalidSignMethod`]
/// during verification instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSignature {
    pub scheme_byte: u8,
    pub digest: [u8; 32],
}

pub trait SignatureVerifier: std::fmt::Debug {
    fn verify(
        &self,
        trader: UserId,
        order_hash: &OrderHash,
        signature: &OrderSignature,
    ) -> Result<(), SignatureError>;
}

/// Verifier backed by registered per-user signing keys.
#[derive(Debug, Clone, Default)]
pub struct KeyedVerifier {
    keys: HashMap<UserId, [u8; 32]>,
}

impl KeyedVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, user: UserId, key: [u8; 32]) {
        self.keys.insert(user, key);
    }

    fn digest(scheme: SignScheme, key: &[u8; 32], order_hash: &OrderHash) -> [u8; 32] {
        let mut hasher = Sha256::new();
        if scheme == SignScheme::Prefixed {
            hasher.update(PREFIX);
        }
        hasher.update(key);
        hasher.update(order_hash.as_bytes());
        hasher.finalize().into()
    }

    /// Produce a signature the verifier will accept. Used by the simulator
    /// and tests; real deployments sign outside the engine.
    pub fn sign(
        &self,
        user: UserId,
        order_hash: &OrderHash,
        scheme: SignScheme,
    ) -> Result<OrderSignature, SignatureError> {
        let key = self.keys.get(&user).ok_or(SignatureError::UnknownSigner(user))?;
        Ok(OrderSignature {
            scheme_byte: scheme.as_byte(),
            digest: Self::digest(scheme, key, order_hash),
        })
    }
}

impl SignatureVerifier for KeyedVerifier {
    fn verify(
        &self,
        trader: UserId,
        order_hash: &OrderHash,
        signature: &OrderSignature,
    ) -> Result<(), SignatureError> {
        let scheme = SignScheme::from_byte(signature.scheme_byte)?;
        let key = self
            .keys
            .get(&trader)
            .ok_or(SignatureError::UnknownSigner(trader))?;
        if Self::digest(scheme, key, order_hash) != signature.digest {
            return Err(SignatureError::BadSignature { trader });
        }
        Ok(())
    }
}

/// Accepts every signature whose scheme byte is known. For environments
/// where authorization happens upstream.
#[derive(Debug, Default)]
pub struct PermissiveVerifier;

impl SignatureVerifier for PermissiveVerifier {
    fn verify(
        &self,
        _trader: UserId,
        _order_hash: &OrderHash,
        signature: &OrderSignature,
    ) -> Result<(), SignatureError> {
        SignScheme::from_byte(signature.scheme_byte)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_hash() -> OrderHash {
        OrderHash([7u8; 32])
    }

    #[test]
    fn sign_then_verify_round_trips_both_schemes() {
        let mut verifier = KeyedVerifier::new();
        verifier.register(UserId(1), [9u8; 32]);

        for scheme in [SignScheme::Direct, SignScheme::Prefixed] {
            let sig = verifier.sign(UserId(1), &order_hash(), scheme).unwrap();
            verifier.verify(UserId(1), &order_hash(), &sig).unwrap();
        }
    }

    #[test]
    fn schemes_do_not_cross_verify() {
        let mut verifier = KeyedVerifier::new();
        verifier.register(UserId(1), [9u8; 32]);

        let mut sig = verifier
            .sign(UserId(1), &order_hash(), SignScheme::Direct)
            .unwrap();
        sig.scheme_byte = SignScheme::Prefixed.as_byte();
        assert_eq!(
            verifier.verify(UserId(1), &order_hash(), &sig),
            Err(SignatureError::BadSignature { trader: UserId(1) })
        );
    }

    #[test]
    fn unknown_scheme_byte_rejected() {
        let mut verifier = KeyedVerifier::new();
        verifier.register(UserId(1), [9u8; 32]);
        let sig = OrderSignature {
            scheme_byte: 0x77,
            digest: [0u8; 32],
        };
        assert_eq!(
            verifier.verify(UserId(1), &order_hash(), &sig),
            Err(SignatureError::InvalidSignMethod(0x77))
        );
        // permissive still gates on the scheme byte
        assert_eq!(
            PermissiveVerifier.verify(UserId(1), &order_hash(), &sig),
            Err(SignatureError::InvalidSignMethod(0x77))
        );
    }

    #[test]
    fn wrong_key_rejected() {
        let mut signer = KeyedVerifier::new();
        signer.register(UserId(1), [9u8; 32]);
        let sig = signer
            .sign(UserId(1), &order_hash(), SignScheme::Direct)
            .unwrap();

        let mut verifier = KeyedVerifier::new();
        verifier.register(UserId(1), [8u8; 32]);
        assert_eq!(
            verifier.verify(UserId(1), &order_hash(), &sig),
            Err(SignatureError::BadSignature { trader: UserId(1) })
        );
    }
}
