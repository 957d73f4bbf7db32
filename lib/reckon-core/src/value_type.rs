use std::fmt;

use serde::{Deserialize, Serialize};

/// The type of value stored under a key.
///
/// The string form of each variant matches the reply of the store's `TYPE` command.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// A string value.
    String,

    /// An unordered set of distinct members.
    Set,

    /// A set of distinct members ordered by score.
    #[serde(rename = "zset")]
    SortedSet,

    /// A mapping of fields to values.
    Hash,

    /// An ordered list of elements.
    List,

    /// A type the sampler does not recognize.
    ///
    /// Observing this value indicates a consistency violation between the sampler and the store, and aborts the run.
    Unknown,
}

impl ValueType {
    /// Parses the reply of a `TYPE` command.
    ///
    /// Any reply that does not name one of the supported value types, including `none` for a key that no longer
    /// exists, maps to [`ValueType::Unknown`].
    pub fn from_type_reply(reply: &str) -> Self {
        match reply.trim() {
            "string" => Self::String,
            "set" => Self::Set,
            "zset" => Self::SortedSet,
            "hash" => Self::Hash,
            "list" => Self::List,
            _ => Self::Unknown,
        }
    }

    /// Returns the name of this value type, as the store reports it.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Set => "set",
            Self::SortedSet => "zset",
            Self::Hash => "hash",
            Self::List => "list",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_replies() {
        assert_eq!(ValueType::from_type_reply("string"), ValueType::String);
        assert_eq!(ValueType::from_type_reply("set"), ValueType::Set);
        assert_eq!(ValueType::from_type_reply("zset"), ValueType::SortedSet);
        assert_eq!(ValueType::from_type_reply("hash"), ValueType::Hash);
        assert_eq!(ValueType::from_type_reply("list\r\n"), ValueType::List);
    }

    #[test]
    fn unrecognized_type_replies() {
        assert_eq!(ValueType::from_type_reply("stream"), ValueType::Unknown);
        assert_eq!(ValueType::from_type_reply("none"), ValueType::Unknown);
        assert_eq!(ValueType::from_type_reply(""), ValueType::Unknown);
    }

    #[test]
    fn display_round_trips_through_type_reply() {
        for vt in [
            ValueType::String,
            ValueType::Set,
            ValueType::SortedSet,
            ValueType::Hash,
            ValueType::List,
        ] {
            assert_eq!(ValueType::from_type_reply(&vt.to_string()), vt);
        }
    }
}
