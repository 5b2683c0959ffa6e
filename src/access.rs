//! Network-origin classification.
//!
//! A caller is internal to a tier when some address of its forwarded-for
//! chain lies inside the tier's ranges and outside the tier's exceptions.
//! The institution and library tiers are evaluated independently.

use std::net::IpAddr;
use std::str::FromStr;

use crate::config::NetworkConfig;
use crate::types::NetworkOrigin;

/// Error returned when a range entry cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address range '{0}'")]
pub struct RangeParseError(pub String);

/// One contiguous block of addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpRange {
    /// `network/prefix`.
    Cidr {
        /// Network address.
        network: IpAddr,
        /// Prefix length in bits.
        prefix: u8,
    },
    /// Inclusive span `start-end`; single addresses and IPv4 wildcards are
    /// stored as spans too.
    Span {
        /// First address.
        start: IpAddr,
        /// Last address.
        end: IpAddr,
    },
}

impl IpRange {
    /// Whether `addr` lies inside this range. Address families never mix.
    pub fn contains(&self, addr: IpAddr) -> bool {
        let addr = canonical(addr);
        match *self {
            IpRange::Cidr { network, prefix } => {
                // a v4-mapped network carries a v6 prefix; the low 32 bits are the v4 part
                let prefix = if network.is_ipv6() && canonical(network).is_ipv4() {
                    prefix.saturating_sub(96)
                } else {
                    prefix
                };
                let network = canonical(network);
                if network.is_ipv4() != addr.is_ipv4() {
                    return false;
                }
                if prefix == 0 {
                    return true;
                }
                let width = width(addr);
                let shift = u32::from(width - prefix.min(width));
                (bits(addr) >> shift) == (bits(network) >> shift)
            }
            IpRange::Span { start, end } => {
                let (start, end) = (canonical(start), canonical(end));
                if start.is_ipv4() != addr.is_ipv4() {
                    return false;
                }
                bits(start) <= bits(addr) && bits(addr) <= bits(end)
            }
        }
    }
}

impl FromStr for IpRange {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || RangeParseError(s.to_string());

        if let Some((network, prefix)) = s.split_once('/') {
            let network: IpAddr = network.trim().parse().map_err(|_| err())?;
            let prefix: u8 = prefix.trim().parse().map_err(|_| err())?;
            if prefix > width(network) {
                return Err(err());
            }
            return Ok(IpRange::Cidr { network, prefix });
        }

        if let Some((start, end)) = s.split_once('-') {
            let start: IpAddr = start.trim().parse().map_err(|_| err())?;
            let end: IpAddr = end.trim().parse().map_err(|_| err())?;
            if start.is_ipv4() != end.is_ipv4() || bits(start) > bits(end) {
                return Err(err());
            }
            return Ok(IpRange::Span { start, end });
        }

        if s.contains('*') {
            return parse_wildcard(s).ok_or_else(err);
        }

        let addr: IpAddr = s.parse().map_err(|_| err())?;
        Ok(IpRange::Span { start: addr, end: addr })
    }
}

/// `129.217.*.*` → span. Wildcards must be trailing octets.
fn parse_wildcard(s: &str) -> Option<IpRange> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut start = [0u8; 4];
    let mut end = [255u8; 4];
    let mut seen_wildcard = false;
    for (i, part) in parts.iter().enumerate() {
        if *part == "*" {
            seen_wildcard = true;
        } else if seen_wildcard {
            return None;
        } else {
            let octet: u8 = part.parse().ok()?;
            start[i] = octet;
            end[i] = octet;
        }
    }
    Some(IpRange::Span {
        start: IpAddr::from(start),
        end: IpAddr::from(end),
    })
}

fn canonical(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(addr),
        v4 => v4,
    }
}

fn width(addr: IpAddr) -> u8 {
    if addr.is_ipv4() { 32 } else { 128 }
}

fn bits(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// A set of address ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpRangeSet(Vec<IpRange>);

impl IpRangeSet {
    /// Parse configured entries, dropping malformed ones with a warning.
    ///
    /// Each entry may hold several ranges separated by `,`, `;` or
    /// whitespace.
    pub fn parse_lenient<S: AsRef<str>>(entries: &[S]) -> Self {
        let mut ranges = Vec::new();
        for entry in entries {
            for item in entry
                .as_ref()
                .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                .filter(|s| !s.is_empty())
            {
                match item.parse::<IpRange>() {
                    Ok(range) => ranges.push(range),
                    Err(e) => tracing::warn!(error = %e, "Ignoring address range"),
                }
            }
        }
        Self(ranges)
    }

    /// Whether any range contains `addr`.
    pub fn contains(&self, addr: IpAddr) -> bool {
        self.0.iter().any(|r| r.contains(addr))
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<IpRange> for IpRangeSet {
    fn from_iter<T: IntoIterator<Item = IpRange>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parsed ranges for both tiers, built once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkPolicy {
    /// Institution network.
    pub institution: IpRangeSet,
    /// Excluded from the institution network.
    pub institution_exceptions: IpRangeSet,
    /// Library network.
    pub library: IpRangeSet,
    /// Excluded from the library network.
    pub library_exceptions: IpRangeSet,
}

impl NetworkPolicy {
    /// Parse the configured ranges.
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self {
            institution: IpRangeSet::parse_lenient(&config.institution_ranges),
            institution_exceptions: IpRangeSet::parse_lenient(&config.institution_exceptions),
            library: IpRangeSet::parse_lenient(&config.library_ranges),
            library_exceptions: IpRangeSet::parse_lenient(&config.library_exceptions),
        }
    }
}

/// Classify a forwarded-for chain against both tiers.
///
/// An empty chain is external to both.
pub fn classify_network(chain: &[IpAddr], policy: &NetworkPolicy) -> NetworkOrigin {
    NetworkOrigin {
        institution_internal: tier_contains(chain, &policy.institution, &policy.institution_exceptions),
        library_internal: tier_contains(chain, &policy.library, &policy.library_exceptions),
    }
}

fn tier_contains(chain: &[IpAddr], ranges: &IpRangeSet, exceptions: &IpRangeSet) -> bool {
    chain
        .iter()
        .any(|&addr| ranges.contains(addr) && !exceptions.contains(addr))
}

/// Parse an `X-Forwarded-For` value into addresses, skipping entries that
/// are not addresses. `v4:port` and `[v6]:port` forms are accepted.
pub fn parse_forwarded_for(value: &str) -> Vec<IpAddr> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            s.parse::<IpAddr>()
                .ok()
                .or_else(|| s.parse::<std::net::SocketAddr>().ok().map(|sa| sa.ip()))
        })
        .collect()
}
