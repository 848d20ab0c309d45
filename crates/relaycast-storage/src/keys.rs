//! Staged object key generation.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Key of one staged object. Owned by the run that allocated it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagedKey(String);

impl StagedKey {
    /// Time-prefixed key with a random suffix under `prefix`.
    pub fn generate(prefix: &str) -> Self {
        Self::generate_at(prefix, Utc::now())
    }

    pub(crate) fn generate_at(prefix: &str, now: DateTime<Utc>) -> Self {
        let prefix = prefix.trim_matches('/');
        StagedKey(format!(
            "{}/{}-{}",
            prefix,
            now.format("%Y%m%dT%H%M%S%3fZ"),
            Uuid::new_v4().simple()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StagedKey {
    fn from(key: String) -> Self {
        StagedKey(key)
    }
}

impl fmt::Display for StagedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_key_layout() {
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let key = StagedKey::generate_at("/staging/", now);
        let (prefix, rest) = key.as_str().split_once('/').unwrap();
        assert_eq!(prefix, "staging");
        assert!(rest.starts_with("20260102T030405000Z-"));
        assert_eq!(rest.len(), "20260102T030405000Z-".len() + 32);
        assert!(!key.as_str().contains(".."));
    }

    #[test]
    fn test_keys_do_not_collide_within_same_instant() {
        let now = Utc::now();
        let keys: HashSet<_> = (0..1000)
            .map(|_| StagedKey::generate_at("staging", now))
            .collect();
        assert_eq!(keys.len(), 1000);
    }
}
