//! IP geolocation enrichment.
//!
//! Lookups are best effort. Every failure (timeout, transport error,
//! non-success status, undecodable body) collapses to
//! [`GeoClassification::unknown`].

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::client::UNKNOWN;
use crate::error::Result;

const LOOKUP_FIELDS: &str = "status,country,regionName,city,isp,mobile,hosting,proxy";

/// Coarse classification of where a connection originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkType {
    Broadband,
    Mobile,
    Hosting,
    Proxy,
    Unknown,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Broadband => "Broadband",
            NetworkType::Mobile => "Mobile",
            NetworkType::Hosting => "Hosting/Data Center",
            NetworkType::Proxy => "Proxy/VPN",
            NetworkType::Unknown => UNKNOWN,
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection flags reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkFlags {
    pub mobile: bool,
    pub hosting: bool,
    pub proxy: bool,
}

/// Mobile beats hosting, hosting beats proxy; no flag means broadband.
pub fn classify_network(flags: NetworkFlags) -> NetworkType {
    if flags.mobile {
        NetworkType::Mobile
    } else if flags.hosting {
        NetworkType::Hosting
    } else if flags.proxy {
        NetworkType::Proxy
    } else {
        NetworkType::Broadband
    }
}

/// Location and network class of an address. Fields the provider left
/// blank are `"Unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoClassification {
    pub country: String,
    pub region: String,
    pub city: String,
    pub isp: String,
    pub network: NetworkType,
}

impl GeoClassification {
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN.to_string(),
            region: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            isp: UNKNOWN.to_string(),
            network: NetworkType::Unknown,
        }
    }
}

impl Default for GeoClassification {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Resolves an IP string to a geo classification. Implementations must not fail.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Looks up `ip`, returning [`GeoClassification::unknown`] on any failure.
    async fn lookup(&self, ip: Option<&str>) -> GeoClassification;
}

/// True for inputs that never warrant a network call.
pub fn is_unresolvable(ip: Option<&str>) -> bool {
    lookup_target(ip).is_none()
}

/// The address to look up, if `ip` is a literal, non-loopback IP address.
///
/// Header-derived values are untrusted; anything that does not parse as an
/// address (including the `"Unknown"` placeholder) never reaches the URL.
fn lookup_target(ip: Option<&str>) -> Option<IpAddr> {
    let ip: IpAddr = ip?.trim().parse().ok()?;
    (!ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
}

/// Body returned by the ip-api.com JSON endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IpApiResponse {
    status: String,
    country: Option<String>,
    region_name: Option<String>,
    city: Option<String>,
    isp: Option<String>,
    mobile: bool,
    hosting: bool,
    proxy: bool,
}

impl IpApiResponse {
    fn into_classification(self) -> Option<GeoClassification> {
        if self.status != "success" {
            return None;
        }

        let network = classify_network(NetworkFlags {
            mobile: self.mobile,
            hosting: self.hosting,
            proxy: self.proxy,
        });

        Some(GeoClassification {
            country: or_unknown(self.country),
            region: or_unknown(self.region_name),
            city: or_unknown(self.city),
            isp: or_unknown(self.isp),
            network,
        })
    }
}

fn or_unknown(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// [`GeoLookup`] backed by the ip-api.com JSON API.
#[derive(Debug, Clone)]
pub struct IpApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl IpApiClient {
    /// Creates a client with a hard per-lookup `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, ip: IpAddr) -> Result<Option<GeoClassification>> {
        let url = format!("{}/json/{}", self.base_url, ip);
        let response = self
            .http
            .get(url)
            .query(&[("fields", LOOKUP_FIELDS)])
            .send()
            .await?
            .error_for_status()?;

        let body: IpApiResponse = response.json().await?;
        Ok(body.into_classification())
    }
}

#[async_trait]
impl GeoLookup for IpApiClient {
    async fn lookup(&self, ip: Option<&str>) -> GeoClassification {
        let Some(ip) = lookup_target(ip) else {
            return GeoClassification::unknown();
        };

        match self.fetch(ip).await {
            Ok(Some(geo)) => geo,
            Ok(None) => {
                tracing::debug!("geo provider reported a failed lookup");
                GeoClassification::unknown()
            }
            Err(e) => {
                tracing::warn!(error = %e, "geo lookup failed");
                GeoClassification::unknown()
            }
        }
    }
}
