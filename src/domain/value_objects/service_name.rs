use std::fmt;
use std::str::FromStr;

/// Units the gateway may start, stop or query. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceName {
    Unbound,
    Cloudflared,
    DnscryptProxy,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown service '{0}' (expected one of: unbound, cloudflared, dnscrypt-proxy)")]
pub struct ServiceNameError(String);

impl ServiceName {
    pub const ALL: [ServiceName; 3] = [Self::Unbound, Self::Cloudflared, Self::DnscryptProxy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unbound => "unbound",
            Self::Cloudflared => "cloudflared",
            Self::DnscryptProxy => "dnscrypt-proxy",
        }
    }
}

impl FromStr for ServiceName {
    type Err = ServiceNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|service| service.as_str() == s)
            .ok_or_else(|| ServiceNameError(s.to_string()))
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
