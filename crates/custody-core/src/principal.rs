use std::fmt;
use std::str::FromStr;

use ed25519_dalek::VerifyingKey;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::PrincipalParseError;

const PRINCIPAL_LEN: usize = 32;
const LABEL_DOMAIN: &[u8] = b"custody-principal";

/// Identity on whose behalf an operation is performed.
///
/// The core treats principals as opaque 32-byte handles. Authentication
/// happens before a principal reaches the ledger.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Principal([u8; PRINCIPAL_LEN]);

impl Principal {
    /// Null sentinel. Never accepted as an owner or authorization target.
    pub const ZERO: Principal = Principal([0u8; PRINCIPAL_LEN]);

    pub const fn from_bytes(bytes: [u8; PRINCIPAL_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PRINCIPAL_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; PRINCIPAL_LEN]
    }

    /// Principal of the holder of an Ed25519 key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }

    /// Deterministic principal for a human-readable label.
    pub fn from_label(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(LABEL_DOMAIN);
        hasher.update(label.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; PRINCIPAL_LEN]> for Principal {
    fn from(bytes: [u8; PRINCIPAL_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<&VerifyingKey> for Principal {
    fn from(key: &VerifyingKey) -> Self {
        Self::from_verifying_key(key)
    }
}

impl FromStr for Principal {
    type Err = PrincipalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let bytes: [u8; PRINCIPAL_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| PrincipalParseError::Length(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", &self.to_hex()[..12])
    }
}

impl Serialize for Principal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ed25519_dalek::SigningKey;

    #[test]
    fn hex_form_parses_back() {
        let alice = Principal::from_label("alice");
        let parsed: Principal = alice.to_hex().parse().unwrap();
        assert_eq!(parsed, alice);

        let prefixed: Principal = format!("0x{alice}").parse().unwrap();
        assert_eq!(prefixed, alice);
    }

    #[test]
    fn rejects_wrong_length_and_bad_hex() {
        assert_eq!(
            "abcd".parse::<Principal>().unwrap_err(),
            PrincipalParseError::Length(2)
        );
        assert!(matches!(
            "zz".parse::<Principal>().unwrap_err(),
            PrincipalParseError::Hex(_)
        ));
    }

    #[test]
    fn labels_are_distinct_and_never_zero() {
        let alice = Principal::from_label("alice");
        let bob = Principal::from_label("bob");
        assert_ne!(alice, bob);
        assert!(!alice.is_zero());
        assert!(Principal::ZERO.is_zero());
        assert_eq!(Principal::default(), Principal::ZERO);
    }

    #[test]
    fn verifying_key_maps_to_its_bytes() {
        let sk = SigningKey::from_bytes(&[7u8; 32]);
        let pk = sk.verifying_key();
        let principal = Principal::from(&pk);
        assert_eq!(principal.as_bytes(), pk.as_bytes());
    }

    #[test]
    fn serializes_as_hex_string() {
        let alice = Principal::from_label("alice");
        let json = serde_json::to_string(&alice).unwrap();
        assert_eq!(json, format!("\"{}\"", alice.to_hex()));
        let back: Principal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, alice);
    }
}
