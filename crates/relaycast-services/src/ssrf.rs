//! Source URL guard
//!
//! Rejects source URLs that would make the service fetch from private or
//! internal networks:
//! - non-http(s) schemes
//! - hosts outside the optional allowlist
//! - private, loopback and link-local addresses or internal hostnames
//! - hostnames that resolve to such addresses (DNS rebinding)

use reqwest::Url;
use std::net::{IpAddr, Ipv6Addr};
use tokio::net::lookup_host;

/// Which source URLs the fetcher may open
#[derive(Debug, Clone, Default)]
pub struct UrlPolicy {
    pub allow_private_ips: bool,
    /// Exact or parent domains; `None` allows every public host
    pub allowlist: Option<Vec<String>>,
}

impl UrlPolicy {
    pub fn new(allow_private_ips: bool, allowlist: Option<Vec<String>>) -> Self {
        UrlPolicy {
            allow_private_ips,
            allowlist,
        }
    }

    /// Parse and vet `url`, returning the parsed form on success.
    pub async fn check(&self, url: &str) -> Result<Url, String> {
        let parsed = Url::parse(url.trim()).map_err(|e| format!("Invalid URL format: {}", e))?;

        let Some(host_name) = self.screen(&parsed)? else {
            return Ok(parsed);
        };

        let port = parsed.port_or_known_default().unwrap_or(80);
        match lookup_host((host_name.as_str(), port)).await {
            Ok(addrs) => {
                for addr in addrs {
                    if is_private_ip(&addr.ip()) {
                        return Err(format!(
                            "Hostname resolves to private/internal IP address: {}",
                            addr.ip()
                        ));
                    }
                }
            }
            Err(e) => {
                // The fetch itself will fail and report a transport error.
                tracing::warn!(host = %host_name, error = %e, "Failed to resolve source hostname");
            }
        }

        Ok(parsed)
    }

    /// Checks that need no DNS lookup. Returns the hostname when it still has
    /// to be resolved and re-checked, `None` when the URL is already cleared.
    pub fn screen(&self, parsed: &Url) -> Result<Option<String>, String> {
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err("URL must start with http:// or https://".to_string());
        }

        let host_name = parsed
            .host_str()
            .ok_or_else(|| "URL must have a host".to_string())?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_lowercase();

        if let Some(allowed_domains) = &self.allowlist {
            let is_allowed = allowed_domains.iter().any(|allowed| {
                let allowed = allowed.to_lowercase();
                host_name == allowed || host_name.ends_with(&format!(".{}", allowed))
            });
            if !is_allowed {
                return Err(format!(
                    "URL hostname '{}' is not in the allowed list",
                    host_name
                ));
            }
        }

        if self.allow_private_ips {
            return Ok(None);
        }

        if let Ok(ip) = host_name.parse::<IpAddr>() {
            if is_private_ip(&ip) {
                return Err("Private/internal IP addresses are not allowed".to_string());
            }
            return Ok(None);
        }

        if is_internal_hostname(&host_name) {
            return Err("Localhost and internal hostnames are not allowed".to_string());
        }

        Ok(Some(host_name))
    }
}

fn is_internal_hostname(host: &str) -> bool {
    host == "localhost"
        || host.ends_with(".localhost")
        || host.ends_with(".local")
        || host.ends_with(".internal")
        || host.contains(".internal.")
        || host.ends_with(".corp")
}

/// Private, loopback, link-local, multicast and unspecified ranges (v4 and v6)
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_multicast()
                || ipv4.is_broadcast()
                || octets[0] == 0
                || (octets[0] == 100 && (64..=127).contains(&octets[1])) // 100.64.0.0/10 CGNAT
        }
        IpAddr::V6(ipv6) => {
            if let Some(mapped) = ipv6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(mapped));
            }
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                || ipv6.is_multicast()
                || is_ipv6_link_local(ipv6)
                || is_ipv6_unique_local(ipv6)
        }
    }
}

/// fe80::/10
fn is_ipv6_link_local(ip: &Ipv6Addr) -> bool {
    ip.segments()[0] & 0xffc0 == 0xfe80
}

/// fc00::/7
fn is_ipv6_unique_local(ip: &Ipv6Addr) -> bool {
    ip.segments()[0] & 0xfe00 == 0xfc00
}
