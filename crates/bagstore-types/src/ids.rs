use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Parse a plain decimal `u64`: ASCII digits only, no sign, no whitespace.
pub(crate) fn parse_decimal(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// The raw numeric value.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_decimal(s)
                    .map(Self)
                    .ok_or_else(|| TypeError::InvalidId(s.to_string()))
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Ledger-assigned data object identifier, unique within a bag.
    DataObjectId
);
numeric_id!(
    /// Ledger identifier of a storage bucket.
    StorageBucketId
);
numeric_id!(
    /// Membership identifier.
    MemberId
);
numeric_id!(
    /// Working group worker identifier (the storage operator's role id).
    WorkerId
);
numeric_id!(
    /// Content channel identifier (owner of a dynamic channel bag).
    ChannelId
);

/// On-chain account: a 32-byte Ed25519 public key.
///
/// Rendered and parsed as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId([u8; 32]);

impl AccountId {
    /// Wrap raw public key bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw public key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| TypeError::InvalidLength {
                expected: 32,
                actual: b.len(),
            })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for AccountId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_id_parses_plain_decimal() {
        assert_eq!("42".parse::<DataObjectId>().unwrap(), DataObjectId(42));
        assert_eq!("0".parse::<WorkerId>().unwrap(), WorkerId(0));
    }

    #[test]
    fn numeric_id_rejects_signs_and_whitespace() {
        assert!("+1".parse::<MemberId>().is_err());
        assert!("-1".parse::<MemberId>().is_err());
        assert!(" 1".parse::<MemberId>().is_err());
        assert!("".parse::<MemberId>().is_err());
        assert!("1a".parse::<MemberId>().is_err());
    }

    #[test]
    fn numeric_id_rejects_overflow() {
        assert!("18446744073709551616".parse::<StorageBucketId>().is_err());
    }

    #[test]
    fn numeric_id_serializes_as_number() {
        let json = serde_json::to_string(&StorageBucketId(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn account_hex_roundtrip() {
        let account = AccountId::from_bytes([0xab; 32]);
        let parsed: AccountId = account.to_hex().parse().unwrap();
        assert_eq!(account, parsed);
    }

    #[test]
    fn account_rejects_short_hex() {
        let err = AccountId::from_hex("abcd").unwrap_err();
        assert_eq!(err, TypeError::InvalidLength { expected: 32, actual: 2 });
    }

    #[test]
    fn account_serializes_as_hex_string() {
        let account = AccountId::from_bytes([1; 32]);
        let json = serde_json::to_string(&account).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, account);
    }
}
