//! Geography-based display names
//!
//! The lookup itself is a collaborator trait so the engine never does
//! network or database I/O; anything the lookup cannot place gets the
//! white-flag fallback.

use crate::config::ProxyConfig;
use std::collections::HashMap;

/// Resolved location for a server address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoInfo {
    pub flag: String,
    pub country: String,
}

impl GeoInfo {
    pub fn unknown() -> Self {
        GeoInfo {
            flag: "🏳️".to_string(),
            country: "Unknown".to_string(),
        }
    }
}

/// Server address → location. Implementations wrap whatever database
/// or service the caller has; failures surface as `None`.
pub trait GeoLookup {
    fn resolve(&self, server: &str) -> Option<GeoInfo>;
}

/// Rewrite display names to `{flag} {country} {protocol}-{nn}` with a
/// counter per (country, protocol) pair, in input order.
pub fn rename_configs<G: GeoLookup>(configs: &mut [ProxyConfig], lookup: &G) {
    let mut counters: HashMap<(String, String), usize> = HashMap::new();
    for config in configs {
        let geo = lookup.resolve(&config.server).unwrap_or_else(GeoInfo::unknown);
        let protocol = config.protocol.as_str().to_string();
        let count = counters
            .entry((geo.country.clone(), protocol.clone()))
            .or_insert(0);
        *count += 1;
        config.name = format!("{} {} {}-{:02}", geo.flag, geo.country, protocol, count);
    }
}
