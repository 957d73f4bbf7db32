use std::sync::LazyLock;

use regex::Regex;

/// Extracts the key count from the keyspace section of an `INFO` reply.
///
/// The first `dbN:keys=...` line wins. Returns `None` if no such line is present.
pub fn parse_keyspace_key_count(info: &str) -> Option<u64> {
    static KEYSPACE_LINE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^db[0-9]+:keys=([0-9]+),").expect("keyspace pattern must compile"));

    KEYSPACE_LINE
        .captures(info)
        .and_then(|captures| captures.get(1))
        .and_then(|count| count.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_database() {
        let info = "# Keyspace\r\ndb0:keys=1234,expires=0,avg_ttl=0\r\n";
        assert_eq!(parse_keyspace_key_count(info), Some(1234));
    }

    #[test]
    fn first_database_wins() {
        let info = "# Keyspace\r\ndb0:keys=7,expires=1,avg_ttl=0\r\ndb3:keys=99,expires=0,avg_ttl=0\r\n";
        assert_eq!(parse_keyspace_key_count(info), Some(7));
    }

    #[test]
    fn empty_keyspace() {
        assert_eq!(parse_keyspace_key_count("# Keyspace\r\n"), None);
        assert_eq!(parse_keyspace_key_count(""), None);
    }

    #[test]
    fn line_must_be_anchored() {
        assert_eq!(parse_keyspace_key_count("xdb0:keys=5,expires=0\r\n"), None);
    }
}
