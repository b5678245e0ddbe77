//! Unbound include-file rendering for an [`UpstreamConfig`].
//!
//! Pure and deterministic: the same config always renders to the same bytes,
//! which keeps snapshots diffable.

use std::fmt::Write;
use std::path::Path;

use super::upstream::{UpstreamConfig, UpstreamMode};

const HEADER: &str = "# Generated by dnspilot. Manual edits are overwritten on the next apply.\n";

/// Default CA bundle Unbound uses to verify DoT upstreams.
pub const TLS_CERT_BUNDLE: &str = "/etc/ssl/certs/ca-certificates.crt";

/// Render resolver config text for `config`. DoT upstreams are verified
/// against `ca_bundle`.
pub fn render(config: &UpstreamConfig, ca_bundle: &Path) -> String {
    let mut out = String::from(HEADER);
    let _ = writeln!(out, "# mode: {}", config.mode);

    match config.mode {
        UpstreamMode::Recursive => {
            out.push_str("# Full recursion from the root servers; no forwarders.\n");
        }
        UpstreamMode::Dot => render_dot(config, ca_bundle, &mut out),
        UpstreamMode::Doh => render_doh(config, &mut out),
    }

    out
}

fn render_dot(config: &UpstreamConfig, ca_bundle: &Path, out: &mut String) {
    let providers = config.enabled_dot_providers();
    if providers.is_empty() {
        out.push_str("# DNS-over-TLS selected but no provider is enabled.\n");
        out.push_str("# Falling back to full recursion; no forwarders.\n");
        return;
    }

    let _ = writeln!(
        out,
        "\nserver:\n    tls-cert-bundle: \"{}\"",
        ca_bundle.display()
    );
    out.push_str("\nforward-zone:\n    name: \".\"\n    forward-tls-upstream: yes\n");
    for provider in providers {
        let _ = writeln!(
            out,
            "    # {} (priority {})",
            single_line(provider.display_name()),
            provider.priority
        );
        let _ = write!(out, "    forward-addr: {}@{}", provider.address, provider.port);
        if let Some(sni) = &provider.sni {
            let _ = write!(out, "#{sni}");
        }
        out.push('\n');
    }
}

/// Comment text must not end the comment line.
fn single_line(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn render_doh(config: &UpstreamConfig, out: &mut String) {
    let proxy = &config.doh_proxy;
    let _ = writeln!(
        out,
        "# DNS-over-HTTPS is handled by the local {} proxy.",
        proxy.kind
    );
    out.push_str("\nforward-zone:\n    name: \".\"\n");
    let _ = writeln!(out, "    # proxy: {}", proxy.kind);
    let _ = writeln!(out, "    forward-addr: 127.0.0.1@{}", proxy.local_port);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::upstream::provider;
    use crate::domain::value_objects::{DomainName, Port};

    fn bundle() -> &'static Path {
        Path::new(TLS_CERT_BUNDLE)
    }

    fn forward_lines(text: &str) -> Vec<&str> {
        text.lines()
            .map(str::trim)
            .filter(|l| l.starts_with("forward-addr:"))
            .collect()
    }

    fn has_forwarding(text: &str) -> bool {
        text.lines().map(str::trim).any(|l| {
            l.starts_with("forward-zone:") || l.starts_with("forward-addr:")
        })
    }

    #[test]
    fn test_recursive_has_no_forwarding() {
        let config = UpstreamConfig {
            mode: UpstreamMode::Recursive,
            dot_providers: vec![provider("cf", "1.1.1.1", 1)],
            ..Default::default()
        };
        let text = render(&config, bundle());
        assert!(text.starts_with(HEADER));
        assert!(!has_forwarding(&text));
    }

    #[test]
    fn test_dot_orders_by_priority() {
        let config = UpstreamConfig {
            mode: UpstreamMode::Dot,
            dot_providers: vec![provider("q9", "9.9.9.9", 100), provider("cf", "1.1.1.1", 1)],
            ..Default::default()
        };
        let text = render(&config, bundle());
        assert_eq!(
            forward_lines(&text),
            vec!["forward-addr: 1.1.1.1@853", "forward-addr: 9.9.9.9@853"]
        );
        assert!(text.contains("forward-tls-upstream: yes"));
        assert!(text.contains(TLS_CERT_BUNDLE));
    }

    #[test]
    fn test_dot_ties_keep_list_order() {
        let config = UpstreamConfig {
            mode: UpstreamMode::Dot,
            dot_providers: vec![
                provider("c", "3.3.3.3", 5),
                provider("a", "1.1.1.1", 5),
                provider("b", "2.2.2.2", 5),
            ],
            ..Default::default()
        };
        assert_eq!(
            forward_lines(&render(&config, bundle())),
            vec![
                "forward-addr: 3.3.3.3@853",
                "forward-addr: 1.1.1.1@853",
                "forward-addr: 2.2.2.2@853"
            ]
        );
    }

    #[test]
    fn test_dot_sni_suffix() {
        let mut cf = provider("cf", "1.1.1.1", 1);
        cf.sni = Some(DomainName::new("cloudflare-dns.com").unwrap());
        let mut ipv6 = provider("q9", "2620:fe::fe", 2);
        ipv6.port = Port::new(8853).unwrap();
        let config = UpstreamConfig {
            mode: UpstreamMode::Dot,
            dot_providers: vec![cf, ipv6],
            ..Default::default()
        };
        assert_eq!(
            forward_lines(&render(&config, bundle())),
            vec![
                "forward-addr: 1.1.1.1@853#cloudflare-dns.com",
                "forward-addr: 2620:fe::fe@8853"
            ]
        );
    }

    #[test]
    fn test_dot_without_enabled_providers_falls_back() {
        let mut off = provider("cf", "1.1.1.1", 1);
        off.enabled = false;
        let config = UpstreamConfig {
            mode: UpstreamMode::Dot,
            dot_providers: vec![off],
            ..Default::default()
        };
        let text = render(&config, bundle());
        assert!(!has_forwarding(&text));
        assert!(text.contains("no provider is enabled"));
    }

    #[test]
    fn test_doh_points_at_local_proxy() {
        let config = UpstreamConfig {
            mode: UpstreamMode::Doh,
            doh_providers: vec![provider("cf", "1.1.1.1", 1)],
            ..Default::default()
        };
        let text = render(&config, bundle());
        assert_eq!(forward_lines(&text), vec!["forward-addr: 127.0.0.1@5053"]);
        assert!(text.contains("proxy: cloudflared"));
        assert!(!text.contains("1.1.1.1"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let config = UpstreamConfig {
            mode: UpstreamMode::Dot,
            dot_providers: vec![provider("q9", "9.9.9.9", 2), provider("cf", "1.1.1.1", 1)],
            ..Default::default()
        };
        let first = render(&config, bundle());
        for _ in 0..5 {
            assert_eq!(render(&config, bundle()), first);
        }
    }

    #[test]
    fn test_dot_uses_given_ca_bundle() {
        let config = UpstreamConfig {
            mode: UpstreamMode::Dot,
            dot_providers: vec![provider("cf", "1.1.1.1", 1)],
            ..Default::default()
        };
        let text = render(&config, Path::new("/srv/pki/roots.pem"));
        assert!(text.contains("    tls-cert-bundle: \"/srv/pki/roots.pem\"\n"));
        assert!(!text.contains(TLS_CERT_BUNDLE));
    }

    #[test]
    fn test_provider_name_cannot_add_directives() {
        let mut cf = provider("cf", "1.1.1.1", 1);
        cf.name = Some("Cloudflare\nforward-addr: 6.6.6.6@53\r\nserver:".into());
        let config = UpstreamConfig {
            mode: UpstreamMode::Dot,
            dot_providers: vec![cf, provider("q9", "9.9.9.9", 2)],
            ..Default::default()
        };
        let text = render(&config, bundle());
        assert_eq!(
            forward_lines(&text),
            vec!["forward-addr: 1.1.1.1@853", "forward-addr: 9.9.9.9@853"]
        );
        assert_eq!(text.lines().filter(|l| l.trim() == "server:").count(), 1);
        assert!(text.contains("# Cloudflare forward-addr: 6.6.6.6@53  server: (priority 1)"));
    }
}
