use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Longest presentation-format name without the trailing dot.
const MAX_NAME_LEN: usize = 253;

static LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").expect("label pattern is valid")
});

/// A fully-qualified DNS name (zone or hostname), lowercased, without the
/// trailing dot. The root zone is represented as `"."`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainName(String);

#[derive(Debug, thiserror::Error)]
pub enum DomainNameError {
    #[error("Domain name is empty")]
    Empty,

    #[error("Domain name too long ({0} characters, max 253)")]
    TooLong(usize),

    #[error("Domain name contains an invalid label: {0:?}")]
    InvalidLabel(String),
}

impl DomainName {
    pub fn new(name: impl Into<String>) -> Result<Self, DomainNameError> {
        let name = name.into().to_lowercase();

        if name == "." {
            return Ok(Self(name));
        }

        let trimmed = name.strip_suffix('.').unwrap_or(&name);
        if trimmed.is_empty() {
            return Err(DomainNameError::Empty);
        }
        if trimmed.len() > MAX_NAME_LEN {
            return Err(DomainNameError::TooLong(trimmed.len()));
        }

        for label in trimmed.split('.') {
            if !LABEL.is_match(label) {
                return Err(DomainNameError::InvalidLabel(label.to_string()));
            }
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn root() -> Self {
        Self(".".to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == "."
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for DomainName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for DomainName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DomainName::new(s).map_err(serde::de::Error::custom)
    }
}
