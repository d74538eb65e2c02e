//! Coarse client attributes taken from request headers.
//!
//! Nothing here fails: unparseable input degrades to `"Unknown"`.

use std::net::{IpAddr, SocketAddr};
use std::sync::LazyLock;

use axum::http::HeaderMap;
use ipnet::IpNet;
use woothee::parser::Parser;

pub const UNKNOWN: &str = "Unknown";

/// Operating system and browser family of the visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMetadata {
    pub os_family: String,
    pub browser_name: String,
    pub is_mobile: bool,
}

impl Default for ClientMetadata {
    fn default() -> Self {
        Self {
            os_family: UNKNOWN.to_string(),
            browser_name: UNKNOWN.to_string(),
            is_mobile: false,
        }
    }
}

/// Parses a `User-Agent` value. Absent or unrecognised agents yield the
/// all-`"Unknown"` metadata.
pub fn parse_user_agent(user_agent: Option<&str>) -> ClientMetadata {
    static PARSER: LazyLock<Parser> = LazyLock::new(Parser::new);

    let Some(parsed) = user_agent.and_then(|ua| PARSER.parse(ua)) else {
        return ClientMetadata::default();
    };

    ClientMetadata {
        os_family: os_family(parsed.os),
        browser_name: known_or_unknown(parsed.name),
        // woothee files both phones and tablets under these two categories
        is_mobile: matches!(parsed.category, "smartphone" | "mobilephone"),
    }
}

/// Collapses woothee's OS names, which carry versions and device models
/// (`"Windows 10"`, `"Mac OSX"`, `"iPad"`), into a family name.
fn os_family(os: &str) -> String {
    let family = match os {
        os if os.starts_with("Windows Phone") => "Windows Phone",
        os if os.starts_with("Windows") => "Windows",
        "Mac OSX" | "Mac OS Classic" => "Mac OS",
        "iPhone" | "iPad" | "iPod" => "iOS",
        "ChromeOS" => "Chrome OS",
        os if os.starts_with("BlackBerry") => "BlackBerry",
        other => other,
    };
    known_or_unknown(family)
}

fn known_or_unknown(value: &str) -> String {
    if value.is_empty() || value.eq_ignore_ascii_case("unknown") {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

/// How far a header's value can be taken at face value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trust {
    /// Injected by our own edge proxy; overwrites anything the client sent.
    Edge,
    /// Set by a CDN in front of the service.
    Cdn,
    /// Set by a reverse proxy.
    Proxy,
    /// A client-extendable hop chain. Entries are filtered before use.
    Chain,
}

/// A header consulted while resolving the client IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpSource {
    pub header: String,
    pub trust: Trust,
}

impl IpSource {
    fn new(header: impl Into<String>, trust: Trust) -> Self {
        Self {
            header: header.into().to_ascii_lowercase(),
            trust,
        }
    }
}

/// Resolves the best-effort public client IP from an ordered header list,
/// falling back to the socket peer address.
#[derive(Debug, Clone)]
pub struct IpResolver {
    sources: Vec<IpSource>,
}

impl IpResolver {
    /// The canonical order: our edge header, then CDN, proxy, and finally the
    /// `x-forwarded-for` chain.
    pub fn new(trusted_edge_header: &str) -> Self {
        Self {
            sources: vec![
                IpSource::new(trusted_edge_header, Trust::Edge),
                IpSource::new("cf-connecting-ip", Trust::Cdn),
                IpSource::new("true-client-ip", Trust::Cdn),
                IpSource::new("x-real-ip", Trust::Proxy),
                IpSource::new("x-forwarded-for", Trust::Chain),
            ],
        }
    }

    pub fn sources(&self) -> &[IpSource] {
        &self.sources
    }

    /// First usable address from the configured sources, then the peer, then
    /// `"Unknown"`. The result is not guaranteed to be a valid IP.
    pub fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        self.sources
            .iter()
            .find_map(|source| {
                let value = headers.get(source.header.as_str())?.to_str().ok()?;
                match source.trust {
                    Trust::Chain => pick_from_chain(value),
                    Trust::Edge | Trust::Cdn | Trust::Proxy => first_entry(value),
                }
            })
            .or_else(|| peer.map(|addr| addr.ip().to_canonical().to_string()))
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

fn first_entry(value: &str) -> Option<String> {
    value
        .split(',')
        .map(str::trim)
        .find(|entry| !entry.is_empty())
        .map(str::to_string)
}

/// First entry that looks like a visitor address, else the first entry.
fn pick_from_chain(value: &str) -> Option<String> {
    let entries: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();

    entries
        .iter()
        .find(|entry| is_candidate_client_ip(entry))
        .or_else(|| entries.first())
        .map(|entry| entry.to_string())
}

/// True when `candidate` parses as an IP that is neither internal nor a known
/// CDN egress address.
pub fn is_candidate_client_ip(candidate: &str) -> bool {
    candidate
        .parse::<IpAddr>()
        .map(|ip| {
            let ip = ip.to_canonical();
            !is_internal(ip) && !is_cdn_egress(ip)
        })
        .unwrap_or(false)
}

static INTERNAL_RANGES: LazyLock<Vec<IpNet>> = LazyLock::new(|| {
    [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "100.64.0.0/10",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "255.255.255.255/32",
        "::/128",
        "::1/128",
        "fc00::/7",
        "fe80::/10",
    ]
    .iter()
    .filter_map(|range| range.parse().ok())
    .collect()
});

// Cloudflare's published egress ranges.
static CDN_RANGES: LazyLock<Vec<IpNet>> = LazyLock::new(|| {
    [
        "173.245.48.0/20",
        "103.21.244.0/22",
        "103.22.200.0/22",
        "103.31.4.0/22",
        "141.101.64.0/18",
        "108.162.192.0/18",
        "190.93.240.0/20",
        "188.114.96.0/20",
        "197.234.240.0/22",
        "198.41.128.0/17",
        "162.158.0.0/15",
        "104.16.0.0/13",
        "104.24.0.0/14",
        "172.64.0.0/13",
        "131.0.72.0/22",
        "2400:cb00::/32",
        "2606:4700::/32",
        "2803:f800::/32",
        "2405:b500::/32",
        "2405:8100::/32",
        "2a06:98c0::/29",
        "2c0f:f248::/32",
    ]
    .iter()
    .filter_map(|range| range.parse().ok())
    .collect()
});

/// Loopback, private, link-local, carrier-grade NAT and unspecified space.
pub fn is_internal(ip: IpAddr) -> bool {
    INTERNAL_RANGES.iter().any(|net| net.contains(&ip))
}

pub fn is_cdn_egress(ip: IpAddr) -> bool {
    CDN_RANGES.iter().any(|net| net.contains(&ip))
}

/// Everything the view recorder needs to know about the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub metadata: ClientMetadata,
    pub ip: String,
}

/// Combines user-agent parsing and IP resolution.
#[derive(Debug, Clone)]
pub struct ClientExtractor {
    ip_resolver: IpResolver,
}

impl ClientExtractor {
    pub fn new(ip_resolver: IpResolver) -> Self {
        Self { ip_resolver }
    }

    /// Never fails; missing inputs become `"Unknown"`.
    pub fn extract(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientInfo {
        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok());

        ClientInfo {
            metadata: parse_user_agent(user_agent),
            ip: self.ip_resolver.resolve(headers, peer),
        }
    }
}
