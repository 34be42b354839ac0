//! HMAC signatures over the gateway's canonical field lists
//!
//! Every signed payload declares its own ordered list of wire strings. The
//! signature is HMAC-SHA512 over those strings joined by `,` and travels as
//! lowercase hex. The field strings must be the exact wire representations;
//! re-serializing parsed values (dates in particular) breaks verification.

use crate::{OmniKassaError, Result};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;
use tracing::warn;

type HmacSha512 = Hmac<Sha512>;

/// Separator between the canonical fields
pub const FIELD_SEPARATOR: &str = ",";

/// Shared secret used to sign and verify payloads
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Wrap raw key bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode a base64 encoded key, the form the merchant dashboard hands out
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
        Ok(Self(bytes))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True for a zero-length key
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SigningKey").field(&"<redacted>").finish()
    }
}

impl From<Vec<u8>> for SigningKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for SigningKey {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// A payload that carries its own signature
pub trait SignedPayload {
    /// Canonical field values in protocol order
    fn signature_data(&self) -> Vec<String>;

    /// Signature as received, hex encoded
    fn signature(&self) -> &str;
}

/// Compute the raw HMAC-SHA512 over the ordered fields
pub fn compute_signature<S: AsRef<str>>(fields: &[S], key: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| OmniKassaError::config(format!("Invalid signing key: {}", e)))?;

    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            mac.update(FIELD_SEPARATOR.as_bytes());
        }
        mac.update(field.as_ref().as_bytes());
    }

    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verify a payload against the key, comparing in constant time
pub fn verify<P: SignedPayload + ?Sized>(payload: &P, key: &[u8]) -> Result<()> {
    let declared = hex::decode(payload.signature().trim()).map_err(|_| {
        warn!("signature is not valid hex");
        OmniKassaError::signature_mismatch("signature is not valid hex")
    })?;

    let expected = compute_signature(&payload.signature_data(), key)?;

    if bool::from(expected.ct_eq(&declared)) {
        Ok(())
    } else {
        warn!("signature does not match payload");
        Err(OmniKassaError::signature_mismatch(
            "signature does not match payload",
        ))
    }
}

/// Signs and verifies payloads with one configured key
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key: SigningKey,
}

impl SignatureVerifier {
    /// Create a verifier for the given key
    pub fn new(key: impl Into<SigningKey>) -> Self {
        Self { key: key.into() }
    }

    /// Raw signature bytes for the ordered fields
    pub fn compute<S: AsRef<str>>(&self, fields: &[S]) -> Result<Vec<u8>> {
        compute_signature(fields, self.key.as_bytes())
    }

    /// Hex signature for the ordered fields, as the gateway would send it
    pub fn sign<S: AsRef<str>>(&self, fields: &[S]) -> Result<String> {
        Ok(hex::encode(self.compute(fields)?))
    }

    /// Verify a payload's declared signature
    pub fn verify<P: SignedPayload + ?Sized>(&self, payload: &P) -> Result<()> {
        verify(payload, self.key.as_bytes())
    }

    /// Key this verifier signs with
    pub fn key(&self) -> &SigningKey {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fields {
        data: Vec<String>,
        signature: String,
    }

    impl SignedPayload for Fields {
        fn signature_data(&self) -> Vec<String> {
            self.data.clone()
        }

        fn signature(&self) -> &str {
            &self.signature
        }
    }

    fn signed(fields: &[&str], key: &[u8]) -> Fields {
        let data: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let signature = hex::encode(compute_signature(&data, key).unwrap());
        Fields { data, signature }
    }

    #[test]
    fn test_known_vector() {
        // HMAC-SHA512("key", "The quick brown fox jumps over the lazy dog")
        let mac = compute_signature(&["The quick brown fox jumps over the lazy dog"], b"key").unwrap();
        assert_eq!(
            hex::encode(mac),
            "b42af09057bac1e2d41708e48a902e09b5ff7f12ab428a4fe86653c73dd248fb\
             82f948a549f7b791a5b41915ee4d1ec3935357e4e2317250d0372afa2ebeeb3a"
        );
    }

    #[test]
    fn test_fields_are_comma_joined() {
        let joined = compute_signature(&["a,b", "c"], b"secret").unwrap();
        let split = compute_signature(&["a", "b", "c"], b"secret").unwrap();
        assert_eq!(joined, split);
        assert_ne!(joined, compute_signature(&["abc"], b"secret").unwrap());
    }

    #[test]
    fn test_verify_accepts_matching_signature() {
        let key = b"secret";
        let payload = signed(&["ORDER-1", "OK-42", "2004", "COMPLETED"], key);
        assert!(verify(&payload, key).is_ok());
    }

    #[test]
    fn test_verify_rejects_altered_field() {
        let key = b"secret";
        let mut payload = signed(&["ORDER-1", "OK-42", "2004", "COMPLETED"], key);
        payload.data[3] = "CANCELLED".to_string();
        let err = verify(&payload, key).unwrap_err();
        assert!(matches!(err, OmniKassaError::SignatureMismatch { .. }));
    }

    #[test]
    fn test_verify_rejects_altered_key() {
        let payload = signed(&["ORDER-1", "OK-42"], b"secret");
        assert!(matches!(
            verify(&payload, b"other-secret"),
            Err(OmniKassaError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn test_verify_rejects_non_hex_signature() {
        let mut payload = signed(&["ORDER-1"], b"secret");
        payload.signature = "not-hex".to_string();
        assert!(matches!(
            verify(&payload, b"secret"),
            Err(OmniKassaError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn test_verifier_sign_matches_free_function() {
        let verifier = SignatureVerifier::new(b"secret".to_vec());
        let hex_sig = verifier.sign(&["x", "y"]).unwrap();
        assert_eq!(
            hex_sig,
            hex::encode(compute_signature(&["x", "y"], b"secret").unwrap())
        );
    }

    #[test]
    fn test_signing_key_from_base64_and_debug() {
        let key = SigningKey::from_base64("c2VjcmV0").unwrap();
        assert_eq!(key.as_bytes(), b"secret");
        assert!(!format!("{:?}", key).contains("secret"));
        assert!(SigningKey::from_base64("***").is_err());
    }
}
