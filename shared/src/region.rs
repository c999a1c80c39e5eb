//! # Regions and Peer Topology
//!
//! The platform is partitioned into a fixed, closed set of regions. Each
//! region names exactly one regional datastore and one fleet of API nodes.
//! A user's home region is chosen at signup/invitation time and never
//! migrates; every token the platform issues carries its owning region as a
//! routable prefix (see [`crate::token`]).
//!
//! The peer endpoint set is static configuration read at process start.
//! There is no runtime discovery: adding a region is a deploy, not an event.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// REGION
// =============================================================================

/// Closed set of deployment regions.
///
/// The lowercase label (`ind1`, `usa1`, `deu1`) is the wire form used in
/// token prefixes, request bodies, and configuration keys. Unknown labels
/// are rejected at the boundary with 401 (token prefixes) or 400 (body
/// fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// India
    Ind1,
    /// United States
    Usa1,
    /// Germany
    Deu1,
}

impl Region {
    /// All regions, in stable catalog order.
    pub const ALL: [Region; 3] = [Region::Ind1, Region::Usa1, Region::Deu1];

    /// The lowercase wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Ind1 => "ind1",
            Region::Usa1 => "usa1",
            Region::Deu1 => "deu1",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ind1" => Ok(Region::Ind1),
            "usa1" => Ok(Region::Usa1),
            "deu1" => Ok(Region::Deu1),
            other => Err(format!("Unknown region: {}", other)),
        }
    }
}

// =============================================================================
// TOPOLOGY
// =============================================================================

/// The process's own region plus the static internal endpoints of every
/// peer region.
///
/// Built once at startup from `INTERNAL_ENDPOINT_*` configuration and
/// shared read-only across handlers. The entry for the process's own region
/// is permitted but never used (a node serves its own region locally).
#[derive(Debug, Clone)]
pub struct RegionTopology {
    /// Region this process serves.
    self_region: Region,
    /// Internal base URLs, e.g. `http://api-ind1.internal:8080`.
    peers: HashMap<Region, String>,
}

impl RegionTopology {
    pub fn new(self_region: Region, peers: HashMap<Region, String>) -> Self {
        Self { self_region, peers }
    }

    pub fn self_region(&self) -> Region {
        self.self_region
    }

    /// Returns `true` when a request resolved to `region` must be served
    /// from this process's own regional store.
    pub fn is_local(&self, region: Region) -> bool {
        region == self.self_region
    }

    /// Internal base URL for a peer region.
    ///
    /// `None` means the region exists in the catalog but no endpoint was
    /// configured; callers surface that as a proxy failure, not a panic.
    pub fn peer_endpoint(&self, region: Region) -> Option<&str> {
        self.peers.get(&region).map(String::as_str)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_round_trips_through_wire_label() {
        for region in Region::ALL {
            assert_eq!(region.as_str().parse::<Region>().unwrap(), region);
        }
    }

    #[test]
    fn test_unknown_region_is_rejected() {
        assert!("mars1".parse::<Region>().is_err());
        assert!("IND1".parse::<Region>().is_err()); // wire labels are lowercase
        assert!("".parse::<Region>().is_err());
    }

    #[test]
    fn test_topology_local_vs_peer() {
        let mut peers = HashMap::new();
        peers.insert(Region::Usa1, "http://api-usa1.internal:8080".to_string());
        let topology = RegionTopology::new(Region::Ind1, peers);

        assert!(topology.is_local(Region::Ind1));
        assert!(!topology.is_local(Region::Usa1));
        assert_eq!(
            topology.peer_endpoint(Region::Usa1),
            Some("http://api-usa1.internal:8080")
        );
        assert_eq!(topology.peer_endpoint(Region::Deu1), None);
    }
}
