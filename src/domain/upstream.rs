use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::value_objects::{DomainName, Port};

#[derive(Debug, Error, PartialEq)]
pub enum UpstreamError {
    #[error("Provider id must be 1-64 characters of [A-Za-z0-9_.-], got: {0:?}")]
    InvalidProviderId(String),

    #[error("Duplicate provider id '{id}' in {list}")]
    DuplicateProviderId { list: &'static str, id: String },

    #[error("Provider '{id}' name must be 1-128 printable characters, got: {name:?}")]
    InvalidProviderName { id: String, name: String },

    #[error("Provider '{0}' uses the root zone as SNI")]
    RootSni(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamMode {
    #[default]
    Recursive,
    Dot,
    Doh,
}

impl fmt::Display for UpstreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recursive => write!(f, "recursive"),
            Self::Dot => write!(f, "dot"),
            Self::Doh => write!(f, "doh"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub address: IpAddr,
    pub port: Port,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sni: Option<DomainName>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
}

fn default_enabled() -> bool {
    true
}

impl Provider {
    /// Server name used for TLS: the SNI if configured, otherwise the address.
    pub fn server_name(&self) -> String {
        match &self.sni {
            Some(sni) => sni.as_str().to_string(),
            None => self.address.to_string(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DohProxyKind {
    #[default]
    Cloudflared,
    DnscryptProxy,
}

impl fmt::Display for DohProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloudflared => write!(f, "cloudflared"),
            Self::DnscryptProxy => write!(f, "dnscrypt-proxy"),
        }
    }
}

/// Local DoH proxy the resolver forwards to in `doh` mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DohProxy {
    #[serde(default)]
    pub kind: DohProxyKind,
    pub local_port: Port,
}

impl Default for DohProxy {
    fn default() -> Self {
        Self {
            kind: DohProxyKind::default(),
            local_port: Port::DOH_PROXY,
        }
    }
}

/// Structured upstream configuration, persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamConfig {
    #[serde(default)]
    pub mode: UpstreamMode,
    #[serde(default)]
    pub dot_providers: Vec<Provider>,
    #[serde(default)]
    pub doh_providers: Vec<Provider>,
    #[serde(default)]
    pub doh_proxy: DohProxy,
}

impl UpstreamConfig {
    /// Check cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), UpstreamError> {
        validate_providers("dotProviders", &self.dot_providers)?;
        validate_providers("dohProviders", &self.doh_providers)?;
        Ok(())
    }

    /// Enabled DoT providers in ascending priority. Ties keep list order.
    pub fn enabled_dot_providers(&self) -> Vec<&Provider> {
        let mut enabled: Vec<&Provider> = self.dot_providers.iter().filter(|p| p.enabled).collect();
        // sort_by_key is stable
        enabled.sort_by_key(|p| p.priority);
        enabled
    }
}

fn validate_providers(list: &'static str, providers: &[Provider]) -> Result<(), UpstreamError> {
    let mut seen = HashSet::new();
    for provider in providers {
        let id = provider.id.as_str();
        let valid_id = (1..=64).contains(&id.len())
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "_.-".contains(c));
        if !valid_id {
            return Err(UpstreamError::InvalidProviderId(id.to_string()));
        }
        if !seen.insert(id) {
            return Err(UpstreamError::DuplicateProviderId {
                list,
                id: id.to_string(),
            });
        }
        if let Some(name) = &provider.name {
            let valid_name =
                (1..=128).contains(&name.chars().count()) && !name.chars().any(char::is_control);
            if !valid_name {
                return Err(UpstreamError::InvalidProviderName {
                    id: id.to_string(),
                    name: name.clone(),
                });
            }
        }
        if provider.sni.as_ref().is_some_and(DomainName::is_root) {
            return Err(UpstreamError::RootSni(id.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn provider(id: &str, address: &str, priority: i32) -> Provider {
    Provider {
        id: id.to_string(),
        name: None,
        address: address.parse().unwrap(),
        port: Port::DOT,
        sni: None,
        enabled: true,
        priority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camel_case_document() {
        let json = r#"{
            "mode": "dot",
            "dotProviders": [
                {"id": "cf", "name": "Cloudflare", "address": "1.1.1.1", "port": 853,
                 "sni": "cloudflare-dns.com", "priority": 1},
                {"id": "q9", "address": "9.9.9.9", "port": 853, "enabled": false}
            ],
            "dohProxy": {"kind": "dnscrypt-proxy", "localPort": 5353}
        }"#;
        let config: UpstreamConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.mode, UpstreamMode::Dot);
        assert_eq!(config.dot_providers.len(), 2);
        assert!(config.dot_providers[0].enabled);
        assert!(!config.dot_providers[1].enabled);
        assert_eq!(config.doh_proxy.kind, DohProxyKind::DnscryptProxy);
        assert_eq!(config.doh_proxy.local_port.value(), 5353);
        assert!(config.doh_providers.is_empty());
    }

    #[test]
    fn test_empty_document_is_recursive() {
        let config: UpstreamConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, UpstreamConfig::default());
        assert_eq!(config.doh_proxy.local_port.value(), 5053);
    }

    #[test]
    fn test_rejects_bad_address_and_sni() {
        let bad_addr = r#"{"dotProviders": [{"id": "x", "address": "1.1.1.1@53", "port": 853}]}"#;
        assert!(serde_json::from_str::<UpstreamConfig>(bad_addr).is_err());

        let bad_sni =
            r#"{"dotProviders": [{"id": "x", "address": "1.1.1.1", "port": 853, "sni": "a#b"}]}"#;
        assert!(serde_json::from_str::<UpstreamConfig>(bad_sni).is_err());
    }

    #[test]
    fn test_validate_duplicate_ids() {
        let config = UpstreamConfig {
            dot_providers: vec![provider("a", "1.1.1.1", 1), provider("a", "9.9.9.9", 2)],
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(UpstreamError::DuplicateProviderId {
                list: "dotProviders",
                id: "a".into()
            })
        );
    }

    #[test]
    fn test_same_id_in_different_lists_is_fine() {
        let config = UpstreamConfig {
            dot_providers: vec![provider("cf", "1.1.1.1", 1)],
            doh_providers: vec![provider("cf", "1.0.0.1", 1)],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_provider_id_charset() {
        let config = UpstreamConfig {
            dot_providers: vec![provider("bad id", "1.1.1.1", 1)],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(UpstreamError::InvalidProviderId(_))
        ));
    }

    #[test]
    fn test_validate_provider_name_is_one_line() {
        let mut cf = provider("cf", "1.1.1.1", 1);
        cf.name = Some("Cloudflare\nforward-addr: 6.6.6.6@53".into());
        let config = UpstreamConfig {
            mode: UpstreamMode::Dot,
            dot_providers: vec![cf],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(UpstreamError::InvalidProviderName { ref id, .. }) if id == "cf"
        ));

        let mut tab = provider("q9", "9.9.9.9", 1);
        tab.name = Some("Quad9\tsecure".into());
        let mut empty = provider("q9", "9.9.9.9", 1);
        empty.name = Some(String::new());
        let mut fine = provider("q9", "9.9.9.9", 1);
        fine.name = Some("Quad9 (Zürich)".into());
        for (p, ok) in [(tab, false), (empty, false), (fine, true)] {
            let config = UpstreamConfig {
                doh_providers: vec![p],
                ..Default::default()
            };
            assert_eq!(config.validate().is_ok(), ok);
        }
    }

    #[test]
    fn test_enabled_dot_providers_stable_order() {
        let mut disabled = provider("off", "8.8.8.8", 0);
        disabled.enabled = false;
        let config = UpstreamConfig {
            dot_providers: vec![
                provider("b", "9.9.9.9", 5),
                disabled,
                provider("a", "1.1.1.1", 1),
                provider("c", "149.112.112.112", 5),
            ],
            ..Default::default()
        };
        let ids: Vec<&str> = config
            .enabled_dot_providers()
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_server_name_falls_back_to_address() {
        let mut p = provider("cf", "1.1.1.1", 1);
        assert_eq!(p.server_name(), "1.1.1.1");
        p.sni = Some(DomainName::new("one.one.one.one").unwrap());
        assert_eq!(p.server_name(), "one.one.one.one");
    }
}
