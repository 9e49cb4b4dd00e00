use ipnet::IpNet;
use std::net::IpAddr;

use crate::error::ConfigError;

/// Decides which peers may open a relay, based on a single CIDR range
/// parsed once at startup.
#[derive(Clone, Debug)]
pub struct AdmissionFilter {
    range: IpNet,
}

impl AdmissionFilter {
    /// Parses `range` as a CIDR block. A bare address is taken as a host route.
    pub fn new(range: &str) -> Result<Self, ConfigError> {
        let range = range.trim();
        let net = range
            .parse::<IpNet>()
            .or_else(|_| range.parse::<IpAddr>().map(IpNet::from))
            .map_err(|_| ConfigError::InvalidRange {
                range: range.to_string(),
            })?;

        Ok(Self { range: net.trunc() })
    }

    #[must_use]
    pub const fn range(&self) -> &IpNet {
        &self.range
    }

    /// Returns true iff `peer` lies within the configured range.
    ///
    /// Dual-stack listeners report IPv4 clients as `::ffff:a.b.c.d`; those are
    /// matched as their IPv4 form. Any other family mismatch is a rejection.
    #[must_use]
    pub fn allow(&self, peer: IpAddr) -> bool {
        match (&self.range, peer) {
            (IpNet::V4(net), IpAddr::V6(v6)) => v6
                .to_ipv4_mapped()
                .is_some_and(|v4| net.contains(&v4)),
            _ => self.range.contains(&peer),
        }
    }
}
