//! Bag identifiers and their textual grammar.
//!
//! A bag is the logical container a data object belongs to. Bags come in two
//! kinds: static bags owned by the council or a working group, and dynamic
//! bags owned by a member or a channel. The textual encoding is:
//!
//! ```text
//! static:council
//! static:wg:<group>          group = storage | content | distribution | gateway
//!                                  | operationsAlpha | operationsBeta | operationsGamma
//! dynamic:member:<member id>
//! dynamic:channel:<channel id>
//! ```
//!
//! [`BagId::parse`] is the single place that turns text into a [`BagId`];
//! both the upload path and the synchronizer go through it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BagIdError;
use crate::ids::{parse_decimal, ChannelId, MemberId};

/// Working groups known to the ledger.
///
/// Ledger operations that are scoped to a group take one of these explicitly
/// instead of a free-form module name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkingGroup {
    Storage,
    Content,
    Distribution,
    Gateway,
    OperationsAlpha,
    OperationsBeta,
    OperationsGamma,
}

impl WorkingGroup {
    pub const ALL: [WorkingGroup; 7] = [
        Self::Storage,
        Self::Content,
        Self::Distribution,
        Self::Gateway,
        Self::OperationsAlpha,
        Self::OperationsBeta,
        Self::OperationsGamma,
    ];

    /// Name used in bag ids and configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Content => "content",
            Self::Distribution => "distribution",
            Self::Gateway => "gateway",
            Self::OperationsAlpha => "operationsAlpha",
            Self::OperationsBeta => "operationsBeta",
            Self::OperationsGamma => "operationsGamma",
        }
    }

    /// Look up a group by its textual name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == name)
    }
}

impl fmt::Display for WorkingGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bags owned by the platform itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StaticBagId {
    Council,
    WorkingGroup(WorkingGroup),
}

/// Bags owned by a member or a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DynamicBagId {
    Member(MemberId),
    Channel(ChannelId),
}

/// Structured bag identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BagId {
    Static(StaticBagId),
    Dynamic(DynamicBagId),
}

/// Coarse classification of a bag's owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BagKind {
    Static,
    Dynamic,
}

impl BagId {
    /// The council bag.
    pub const COUNCIL: Self = Self::Static(StaticBagId::Council);

    /// Static bag of a working group.
    pub const fn working_group(group: WorkingGroup) -> Self {
        Self::Static(StaticBagId::WorkingGroup(group))
    }

    /// Dynamic bag of a member.
    pub const fn member(id: MemberId) -> Self {
        Self::Dynamic(DynamicBagId::Member(id))
    }

    /// Dynamic bag of a channel.
    pub const fn channel(id: ChannelId) -> Self {
        Self::Dynamic(DynamicBagId::Channel(id))
    }

    /// Parse the textual encoding. Pure; performs no I/O.
    pub fn parse(input: &str) -> Result<Self, BagIdError> {
        let mut parts = input.split(':');
        let kind = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();

        match (kind, rest.as_slice()) {
            ("static", ["council"]) => Ok(Self::COUNCIL),
            ("static", ["wg", group]) => WorkingGroup::from_name(group)
                .map(Self::working_group)
                .ok_or_else(|| BagIdError::malformed(input, "unknown working group")),
            ("static", _) => Err(BagIdError::malformed(input, "unknown static bag")),
            ("dynamic", ["member", id]) => parse_decimal(id)
                .map(|id| Self::member(MemberId(id)))
                .ok_or_else(|| BagIdError::malformed(input, "invalid member id")),
            ("dynamic", ["channel", id]) => parse_decimal(id)
                .map(|id| Self::channel(ChannelId(id)))
                .ok_or_else(|| BagIdError::malformed(input, "invalid channel id")),
            ("dynamic", _) => Err(BagIdError::malformed(input, "unknown dynamic bag")),
            _ => Err(BagIdError::malformed(input, "expected 'static' or 'dynamic' prefix")),
        }
    }

    pub fn kind(&self) -> BagKind {
        match self {
            Self::Static(_) => BagKind::Static,
            Self::Dynamic(_) => BagKind::Dynamic,
        }
    }
}

impl fmt::Display for BagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(StaticBagId::Council) => f.write_str("static:council"),
            Self::Static(StaticBagId::WorkingGroup(group)) => write!(f, "static:wg:{group}"),
            Self::Dynamic(DynamicBagId::Member(id)) => write!(f, "dynamic:member:{id}"),
            Self::Dynamic(DynamicBagId::Channel(id)) => write!(f, "dynamic:channel:{id}"),
        }
    }
}

impl FromStr for BagId {
    type Err = BagIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for BagId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BagId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_council() {
        assert_eq!(BagId::parse("static:council").unwrap(), BagId::COUNCIL);
        assert_eq!(BagId::COUNCIL.kind(), BagKind::Static);
    }

    #[test]
    fn parses_working_group_bags() {
        assert_eq!(
            BagId::parse("static:wg:storage").unwrap(),
            BagId::working_group(WorkingGroup::Storage)
        );
        assert_eq!(
            BagId::parse("static:wg:operationsBeta").unwrap(),
            BagId::working_group(WorkingGroup::OperationsBeta)
        );
    }

    #[test]
    fn parses_dynamic_bags() {
        let member = BagId::parse("dynamic:member:4").unwrap();
        assert_eq!(member, BagId::member(MemberId(4)));
        assert_eq!(member.kind(), BagKind::Dynamic);
        assert_eq!(
            BagId::parse("dynamic:channel:1024").unwrap(),
            BagId::channel(ChannelId(1024))
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for input in [
            "",
            "static",
            "static:",
            "static:council:1",
            "static:wg",
            "static:wg:Storage",
            "static:wg:unknown",
            "dynamic:member",
            "dynamic:member:",
            "dynamic:member:-1",
            "dynamic:member:1:2",
            "dynamic:channel:x",
            "dynamic:dao:1",
            "council",
            "STATIC:council",
            " static:council",
        ] {
            let err = BagId::parse(input).unwrap_err();
            assert!(matches!(err, BagIdError::Malformed { .. }), "{input:?}");
        }
    }

    #[test]
    fn error_names_input() {
        let err = BagId::parse("dynamic:member:abc").unwrap_err();
        assert!(err.to_string().contains("dynamic:member:abc"));
        assert!(err.to_string().contains("invalid member id"));
    }

    #[test]
    fn serde_uses_textual_form() {
        let json = serde_json::to_string(&BagId::channel(ChannelId(9))).unwrap();
        assert_eq!(json, "\"dynamic:channel:9\"");
        let parsed: BagId = serde_json::from_str("\"static:wg:gateway\"").unwrap();
        assert_eq!(parsed, BagId::working_group(WorkingGroup::Gateway));
        assert!(serde_json::from_str::<BagId>("\"static:nope\"").is_err());
    }

    #[test]
    fn working_group_serde_matches_bag_names() {
        for group in WorkingGroup::ALL {
            let json = serde_json::to_string(&group).unwrap();
            assert_eq!(json, format!("\"{}\"", group.as_str()));
        }
    }

    fn arb_bag() -> impl Strategy<Value = BagId> {
        prop_oneof![
            Just(BagId::COUNCIL),
            proptest::sample::select(WorkingGroup::ALL.to_vec()).prop_map(BagId::working_group),
            any::<u64>().prop_map(|id| BagId::member(MemberId(id))),
            any::<u64>().prop_map(|id| BagId::channel(ChannelId(id))),
        ]
    }

    proptest! {
        #[test]
        fn display_is_accepted_by_parse(bag in arb_bag()) {
            prop_assert_eq!(BagId::parse(&bag.to_string()).unwrap(), bag);
        }

        #[test]
        fn parse_never_panics(input in ".*") {
            let _ = BagId::parse(&input);
        }
    }
}
