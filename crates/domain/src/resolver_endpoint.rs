use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use crate::DomainError;

/// Default DNS-over-TLS port (RFC 7858).
pub const DEFAULT_DOT_PORT: u16 = 853;

/// An upstream DNS-over-TLS resolver parsed from a `tls://HOST[:PORT]` URL.
///
/// `host` is kept verbatim (hostname or IP literal) and doubles as the TLS
/// server name and the deduplication key during startup selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolverEndpoint {
    host: Arc<str>,
    port: u16,
}

impl ResolverEndpoint {
    pub fn new(host: impl Into<Arc<str>>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` form accepted by `TcpStream::connect`, bracketing IPv6 literals.
    pub fn dial_target(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("[{}]:{}", self.host, self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }
}

impl fmt::Display for ResolverEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tls://{}", self.dial_target())
    }
}

fn parse_host_port(s: &str) -> Result<(&str, u16), String> {
    if let Some(rest) = s.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| format!("Unterminated IPv6 literal in '{}'", s))?;
        let host = &rest[..end];
        let tail = &rest[end + 1..];
        if tail.is_empty() {
            return Ok((host, DEFAULT_DOT_PORT));
        }
        let port_str = tail
            .strip_prefix(':')
            .ok_or_else(|| format!("Unexpected characters after IPv6 literal in '{}'", s))?;
        let port = port_str
            .parse::<u16>()
            .map_err(|e| format!("Invalid port in '{}': {}", s, e))?;
        return Ok((host, port));
    }

    // A bare IPv6 literal has several colons and no port.
    if s.parse::<IpAddr>().is_ok() {
        return Ok((s, DEFAULT_DOT_PORT));
    }

    match s.rsplit_once(':') {
        Some((host, port_str)) => {
            let port = port_str
                .parse::<u16>()
                .map_err(|e| format!("Invalid port in '{}': {}", s, e))?;
            Ok((host, port))
        }
        None => Ok((s, DEFAULT_DOT_PORT)),
    }
}

impl FromStr for ResolverEndpoint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("tls://").ok_or_else(|| {
            DomainError::InvalidEndpoint(format!(
                "Unsupported resolver '{}'. Expected 'tls://HOST[:PORT]'",
                s
            ))
        })?;
        let rest = rest.trim_end_matches('/');

        let (host, port) = parse_host_port(rest).map_err(DomainError::InvalidEndpoint)?;
        if host.is_empty() {
            return Err(DomainError::InvalidEndpoint(format!(
                "Missing host in '{}'",
                s
            )));
        }
        if port == 0 {
            return Err(DomainError::InvalidEndpoint(format!(
                "Port 0 is not valid in '{}'",
                s
            )));
        }

        Ok(Self::new(host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hostname_with_port() {
        let ep: ResolverEndpoint = "tls://dns.google:853".parse().unwrap();
        assert_eq!(ep.host(), "dns.google");
        assert_eq!(ep.port(), 853);
        assert_eq!(ep.dial_target(), "dns.google:853");
    }

    #[test]
    fn test_parse_default_port() {
        let ep: ResolverEndpoint = "tls://one.one.one.one".parse().unwrap();
        assert_eq!(ep.port(), DEFAULT_DOT_PORT);
    }

    #[test]
    fn test_parse_ipv4_literal() {
        let ep: ResolverEndpoint = "tls://1.1.1.1:8853".parse().unwrap();
        assert_eq!(ep.host(), "1.1.1.1");
        assert_eq!(ep.dial_target(), "1.1.1.1:8853");
    }

    #[test]
    fn test_parse_bracketed_ipv6() {
        let ep: ResolverEndpoint = "tls://[2001:4860:4860::8888]:853".parse().unwrap();
        assert_eq!(ep.host(), "2001:4860:4860::8888");
        assert_eq!(ep.dial_target(), "[2001:4860:4860::8888]:853");
    }

    #[test]
    fn test_parse_bare_ipv6_uses_default_port() {
        let ep: ResolverEndpoint = "tls://2606:4700:4700::1111".parse().unwrap();
        assert_eq!(ep.host(), "2606:4700:4700::1111");
        assert_eq!(ep.port(), DEFAULT_DOT_PORT);
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!("udp://8.8.8.8:53".parse::<ResolverEndpoint>().is_err());
        assert!("https://dns.google/dns-query"
            .parse::<ResolverEndpoint>()
            .is_err());
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!("tls://dns.google:abc".parse::<ResolverEndpoint>().is_err());
        assert!("tls://dns.google:0".parse::<ResolverEndpoint>().is_err());
        assert!("tls://".parse::<ResolverEndpoint>().is_err());
    }

    #[test]
    fn test_display_round_trips_url() {
        let ep: ResolverEndpoint = "tls://dns.quad9.net:853".parse().unwrap();
        assert_eq!(ep.to_string(), "tls://dns.quad9.net:853");
    }
}
