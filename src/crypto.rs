//! Cryptographic primitives consumed by the appendix subsystem.
//!
//! The subsystem treats digest hashing, public-key canonicalization, and
//! account-id derivation as simple deterministic functions (safe to call
//! directly), but treats ECDH-derived symmetric encryption as a swappable
//! external collaborator behind [`EncryptionProvider`] — a node is free to
//! supply a hardened AEAD implementation in place of the reference one
//! shipped here.

use curve25519_dalek::montgomery::MontgomeryPoint;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// `sha256(bytes) -> [u8; 32]`.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Computes the canonical `PrunableEncryptedMessage` hash:
/// `sha256(isText_byte ‖ isCompressed_byte ‖ data ‖ nonce)`.
pub fn prunable_hash(is_text: bool, is_compressed: bool, data: &[u8], nonce: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([is_text as u8]);
    hasher.update([is_compressed as u8]);
    hasher.update(data);
    hasher.update(nonce);
    hasher.finalize().into()
}

/// `isCanonicalPublicKey([u8; 32]) -> bool`.
///
/// Public-key announcements and encrypted-message recipients carry an
/// X25519 (Montgomery) u-coordinate. A key is canonical when the
/// u-coordinate is a valid curve x-coordinate (the encoding isn't a
/// non-canonical/out-of-range value) and the resulting point is not one of
/// the small-order (8-torsion) points.
pub fn is_canonical_public_key(public_key: &[u8; 32]) -> bool {
    match MontgomeryPoint(*public_key).to_edwards(0) {
        Some(point) => !point.is_small_order(),
        None => false,
    }
}

/// `accountIdFromKey(publicKey) -> i64`: the first 8 bytes of
/// `sha256(publicKey)`, reinterpreted little-endian as a signed 64-bit
/// integer. The family's standard account-id derivation.
pub fn account_id_from_key(public_key: &[u8; 32]) -> i64 {
    let digest = sha256(public_key);
    i64::from_le_bytes(digest[..8].try_into().unwrap())
}

/// The ECDH + symmetric-encryption interface an appendix calls to seal an
/// unsealed draft. Kept abstract so a node can substitute a hardened AEAD.
pub trait EncryptionProvider: Send + Sync {
    /// Encrypts `plaintext` for `recipient_public_key` using `sender_secret`,
    /// returning `(ciphertext, nonce)` with `nonce.len() == 32`.
    fn encrypt(
        &self,
        plaintext: &[u8],
        sender_secret: &[u8; 32],
        recipient_public_key: &[u8; 32],
    ) -> (Vec<u8>, [u8; 32]);

    /// Predicts the on-wire ciphertext length for a plaintext of this size,
    /// used to size unsealed drafts for fee purposes before `encrypt` runs.
    fn encrypted_data_length(&self, plaintext_len: usize) -> i32;
}

/// Reference [`EncryptionProvider`]: X25519 key agreement followed by an
/// HMAC-SHA256 counter-mode keystream. Adequate for a single node and for
/// this crate's own tests; production deployments needing a hardened AEAD
/// should supply their own provider.
///
/// Ciphertext framing: 16-byte HMAC tag prefix (so `getEncryptedDataLength`
/// and the `dataLen - 16` fee formula agree with the wire format) followed
/// by the XOR-masked plaintext.
pub struct X25519EncryptionProvider;

const MAC_LEN: usize = 16;

impl X25519EncryptionProvider {
    fn shared_key(sender_secret: &[u8; 32], recipient_public_key: &[u8; 32]) -> [u8; 32] {
        let secret = StaticSecret::from(*sender_secret);
        let public = PublicKey::from(*recipient_public_key);
        let shared = secret.diffie_hellman(&public);
        sha256(shared.as_bytes())
    }

    fn keystream(key: &[u8; 32], nonce: &[u8; 32], len: usize) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(len));
        let mut counter: u32 = 0;
        while out.len() < len {
            let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
            mac.update(nonce);
            mac.update(&counter.to_le_bytes());
            let block = mac.finalize().into_bytes();
            let take = (len - out.len()).min(block.len());
            out.extend_from_slice(&block[..take]);
            counter += 1;
        }
        out
    }

    fn tag(key: &[u8; 32], nonce: &[u8; 32], ciphertext: &[u8]) -> [u8; MAC_LEN] {
        let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
        mac.update(b"nxt-appendix-tag");
        mac.update(nonce);
        mac.update(ciphertext);
        let full = mac.finalize().into_bytes();
        full[..MAC_LEN].try_into().unwrap()
    }
}

impl EncryptionProvider for X25519EncryptionProvider {
    fn encrypt(
        &self,
        plaintext: &[u8],
        sender_secret: &[u8; 32],
        recipient_public_key: &[u8; 32],
    ) -> (Vec<u8>, [u8; 32]) {
        let key = Self::shared_key(sender_secret, recipient_public_key);
        let mut nonce = [0u8; 32];
        rand::Rng::fill(&mut rand::rng(), &mut nonce);

        let mask = Self::keystream(&key, &nonce, plaintext.len());
        let masked: Vec<u8> = plaintext
            .iter()
            .zip(mask.iter())
            .map(|(p, m)| p ^ m)
            .collect();

        let tag = Self::tag(&key, &nonce, &masked);
        let mut ciphertext = Vec::with_capacity(MAC_LEN + masked.len());
        ciphertext.extend_from_slice(&tag);
        ciphertext.extend_from_slice(&masked);
        (ciphertext, nonce)
    }

    fn encrypted_data_length(&self, plaintext_len: usize) -> i32 {
        (plaintext_len + MAC_LEN) as i32
    }
}
