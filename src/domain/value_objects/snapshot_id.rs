use std::fmt;
use std::sync::LazyLock;
use std::time::SystemTime;

use regex::Regex;

static SNAPSHOT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{8}T\d{12}Z(?:-\d{2})?$").expect("snapshot id pattern is valid")
});

/// Timestamp-derived snapshot identifier, e.g. `20261019T120000123456Z`.
///
/// Ids compare lexically in creation order, so a sorted directory listing
/// is a chronological one. Collisions within the same microsecond get a
/// two-digit suffix (`-01`, `-02`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotId(String);

#[derive(Debug, thiserror::Error)]
#[error("Invalid snapshot id: {0:?}")]
pub struct SnapshotIdError(String);

impl SnapshotId {
    pub fn parse(id: impl Into<String>) -> Result<Self, SnapshotIdError> {
        let id = id.into();
        if SNAPSHOT_ID.is_match(&id) {
            Ok(Self(id))
        } else {
            Err(SnapshotIdError(id))
        }
    }

    /// Id for `time` and its ISO-8601 timestamp.
    pub fn from_time(time: SystemTime) -> (Self, String) {
        let iso = humantime::format_rfc3339_micros(time).to_string();
        let compact: String = iso.chars().filter(|c| !matches!(c, '-' | ':' | '.')).collect();
        (Self(compact), iso)
    }

    /// The `n`th collision variant of this id.
    pub fn with_suffix(&self, n: u8) -> Self {
        let base = self.0.split('-').next().unwrap_or(&self.0);
        Self(format!("{base}-{n:02}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for SnapshotId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for SnapshotId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SnapshotId::parse(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_from_time_is_parseable() {
        let (id, iso) = SnapshotId::from_time(SystemTime::UNIX_EPOCH + Duration::from_micros(1));
        assert_eq!(id.as_str(), "19700101T000000000001Z");
        assert_eq!(iso, "1970-01-01T00:00:00.000001Z");
        assert!(SnapshotId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn test_ids_sort_chronologically() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_800_000_000);
        let (a, _) = SnapshotId::from_time(t);
        let (b, _) = SnapshotId::from_time(t + Duration::from_micros(1));
        let (c, _) = SnapshotId::from_time(t + Duration::from_secs(3600));
        assert!(a < b && b < c);
        assert!(a < a.with_suffix(1));
        assert!(a.with_suffix(1) < b);
    }

    #[test]
    fn test_with_suffix_replaces_existing_suffix() {
        let (id, _) = SnapshotId::from_time(SystemTime::UNIX_EPOCH);
        assert_eq!(id.with_suffix(1).with_suffix(2).as_str(), "19700101T000000000000Z-02");
    }

    #[test]
    fn test_rejects_path_like_ids() {
        assert!(SnapshotId::parse("../../etc").is_err());
        assert!(SnapshotId::parse("20261019T120000123456Z/..").is_err());
        assert!(SnapshotId::parse("latest").is_err());
    }
}
