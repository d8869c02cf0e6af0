//! URL validation for SSRF protection.
//!
//! Monitors are user-supplied, so every run re-validates the target before
//! anything is fetched.

use std::collections::HashSet;
use std::net::IpAddr;

use ::url::{Host, Url};
use tracing::debug;

use crate::error::{SecurityError, SecurityResult};

/// URL validator for SSRF protection.
///
/// Rejects:
/// - Non-HTTP(S) schemes (file://, ftp://)
/// - Loopback and unspecified addresses (localhost, 127.0.0.1, ::1, 0.0.0.0)
/// - Private and link-local ranges (10.x, 172.16.x, 192.168.x, 169.254.x, fc00::/7, fe80::/10)
/// - Internal host suffixes (`*.local`, `*.internal`)
#[derive(Debug, Clone)]
pub struct UrlValidator {
    /// Allowed URL schemes
    allowed_schemes: HashSet<String>,

    /// Blocked hostnames
    blocked_hosts: HashSet<String>,

    /// Blocked hostname suffixes
    blocked_suffixes: Vec<String>,

    /// Blocked CIDR ranges
    blocked_cidrs: Vec<ipnet::IpNet>,

    /// Additional allowed hosts (bypass normal validation)
    allowed_hosts: HashSet<String>,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new()
    }
}

const BLOCKED_CIDRS: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "::/128",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

impl UrlValidator {
    /// Create a new URL validator with default security rules.
    pub fn new() -> Self {
        Self {
            allowed_schemes: ["http", "https"].into_iter().map(String::from).collect(),
            blocked_hosts: ["localhost", "metadata.google.internal"]
                .into_iter()
                .map(String::from)
                .collect(),
            blocked_suffixes: vec![".local".to_string(), ".internal".to_string()],
            blocked_cidrs: BLOCKED_CIDRS
                .iter()
                .filter_map(|cidr| cidr.parse().ok())
                .collect(),
            allowed_hosts: HashSet::new(),
        }
    }

    /// Add an allowed host (bypasses validation).
    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.insert(host.into().to_ascii_lowercase());
        self
    }

    /// Block an additional host.
    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.insert(host.into().to_ascii_lowercase());
        self
    }

    /// Block an additional CIDR range.
    pub fn block_cidr(mut self, cidr: ipnet::IpNet) -> Self {
        self.blocked_cidrs.push(cidr);
        self
    }

    /// Validate a URL and return its canonical form with the fragment stripped.
    pub fn validate(&self, input: &str) -> SecurityResult<Url> {
        let mut parsed = Url::parse(input.trim())?;

        if !self.allowed_schemes.contains(parsed.scheme()) {
            return Err(SecurityError::DisallowedScheme(parsed.scheme().to_string()));
        }

        let host = parsed.host().ok_or(SecurityError::NoHost)?;
        let host_label = match &host {
            Host::Domain(domain) => domain.trim_end_matches('.').to_ascii_lowercase(),
            Host::Ipv4(ip) => ip.to_string(),
            Host::Ipv6(ip) => ip.to_string(),
        };

        if !self.allowed_hosts.contains(&host_label) {
            match host {
                Host::Domain(_) => self.check_domain(&host_label)?,
                Host::Ipv4(ip) => self.check_ip(IpAddr::V4(ip))?,
                Host::Ipv6(ip) => self.check_ip(IpAddr::V6(ip))?,
            }
        }

        parsed.set_fragment(None);
        Ok(parsed)
    }

    /// Validate a URL, then resolve its host and check every address.
    ///
    /// Catches public names that resolve to internal addresses. A host that
    /// does not resolve passes; the fetch reports it.
    pub async fn validate_with_dns(&self, input: &str) -> SecurityResult<Url> {
        let url = self.validate(input)?;

        let Some(Host::Domain(domain)) = url.host() else {
            return Ok(url);
        };
        let domain = domain.trim_end_matches('.').to_ascii_lowercase();
        if self.allowed_hosts.contains(&domain) {
            return Ok(url);
        }

        let port = url.port_or_known_default().unwrap_or(80);
        let addrs = match tokio::net::lookup_host((domain.as_str(), port)).await {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!(host = %domain, error = %e, "DNS lookup failed during validation");
                return Ok(url);
            }
        };
        for addr in addrs {
            if self.check_ip(addr.ip()).is_err() {
                return Err(SecurityError::BlockedHost(format!(
                    "{} resolves to {}",
                    domain,
                    addr.ip()
                )));
            }
        }

        Ok(url)
    }

    fn check_domain(&self, domain: &str) -> SecurityResult<()> {
        if self.blocked_hosts.contains(domain) {
            return Err(SecurityError::BlockedHost(domain.to_string()));
        }
        if self
            .blocked_suffixes
            .iter()
            .any(|suffix| domain.ends_with(suffix.as_str()))
        {
            return Err(SecurityError::BlockedHost(domain.to_string()));
        }
        Ok(())
    }

    fn check_ip(&self, ip: IpAddr) -> SecurityResult<()> {
        // IPv4-mapped IPv6 (::ffff:10.0.0.1) is checked against the v4 ranges
        let ip = match ip {
            IpAddr::V6(v6) => v6
                .to_ipv4_mapped()
                .map(IpAddr::V4)
                .unwrap_or(IpAddr::V6(v6)),
            v4 => v4,
        };
        if self.blocked_cidrs.iter().any(|cidr| cidr.contains(&ip)) {
            return Err(SecurityError::BlockedHost(ip.to_string()));
        }
        Ok(())
    }
}
