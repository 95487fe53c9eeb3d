//! Broadcaster network identity (spec §3, §4.1)

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// A broadcaster's network identity: internal/external address plus port.
///
/// Identity (`endpoint_id`) is the canonical string form; two endpoints are
/// equal iff their identities match. Hostname comparisons are
/// case-insensitive, mirroring how the `internal_ip`/`external_ip` fields may
/// carry hostnames rather than raw addresses in some deployments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub internal_ip: String,
    pub external_ip: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(internal_ip: impl Into<String>, external_ip: impl Into<String>, port: u16) -> Self {
        Self {
            internal_ip: internal_ip.into(),
            external_ip: external_ip.into(),
            port,
        }
    }

    /// A loopback endpoint, used for broadcasters that have not yet reported
    /// real connectivity details.
    pub fn unknown() -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED.to_string(), Ipv4Addr::UNSPECIFIED.to_string(), 0)
    }

    /// Canonical string identity: `"<internal_ip>:<external_ip>:<port>"`.
    pub fn endpoint_id(&self) -> String {
        format!(
            "{}:{}:{}",
            self.internal_ip.to_ascii_lowercase(),
            self.external_ip.to_ascii_lowercase(),
            self.port
        )
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.endpoint_id() == other.endpoint_id()
    }
}
impl Eq for Endpoint {}

impl std::hash::Hash for Endpoint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.endpoint_id().hash(state);
    }
}
