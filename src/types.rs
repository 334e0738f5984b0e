use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;

use crate::error::Error;

macro_rules! impl_string_id {
    (pub struct $outer:ident) => {
        #[derive(
            Debug,
            Clone,
            Serialize,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Deserialize,
            Shrinkwrap,
        )]
        #[serde(transparent)]
        pub struct $outer(pub String);

        impl $outer {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $outer {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $outer {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $outer {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

impl_string_id!(pub struct ContractName);
impl_string_id!(pub struct Network);

impl Network {
    /// The ephemeral development network. Address books and transaction
    /// hashes are never persisted for it.
    pub const LOCAL: &'static str = "local";

    pub fn local() -> Self {
        Self(Self::LOCAL.to_owned())
    }

    pub fn is_local(&self) -> bool {
        self.0 == Self::LOCAL
    }
}

/// Unique task identifier following the `YYYYMMDD-slug` convention.
///
/// The date prefix makes the lexicographic ordering chronological, which
/// keeps serialized address books stable across runs.
#[derive(
    Debug,
    Clone,
    Serialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Shrinkwrap,
)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn date_prefix(&self) -> &str {
        &self.0[..8]
    }
}

impl FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();

        let valid = bytes.len() > 9
            && bytes[..8].iter().all(u8::is_ascii_digit)
            && bytes[8] == b'-'
            && bytes[9..]
                .iter()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == b'-');

        if !valid {
            return Err(Error::InvalidTaskId { id: s.to_owned() });
        }

        Ok(Self(s.to_owned()))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_prefixed_slugs() {
        let id: TaskId = "20210418-vault".parse().unwrap();

        assert_eq!(id.as_str(), "20210418-vault");
        assert_eq!(id.date_prefix(), "20210418");
    }

    #[test]
    fn rejects_malformed_ids() {
        for id in ["vault", "2021-vault", "20210418-", "20210418_vault", "20210418-Vault"] {
            assert!(id.parse::<TaskId>().is_err(), "accepted {id}");
        }
    }

    #[test]
    fn orders_chronologically() {
        let v1: TaskId = "20210418-weighted-pool-factory".parse().unwrap();
        let v4: TaskId = "20230320-weighted-pool-factory-v4".parse().unwrap();

        assert!(v1 < v4);
    }
}
