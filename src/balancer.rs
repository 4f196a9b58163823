//! Quota-based protocol balancing
//!
//! Selection runs in two passes: protocols in ascending priority order
//! draw up to their quota, then a shuffled pool of the remainder backfills
//! buckets that still have headroom. All randomness comes from the
//! caller's RNG so runs are reproducible under a fixed seed.

use crate::config::{Protocol, ProxyConfig};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

/// Per-protocol selection policy. Lower `priority` is served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolPolicy {
    pub priority: i32,
    pub min_configs: usize,
    pub max_configs: usize,
}

impl Default for ProtocolPolicy {
    fn default() -> Self {
        // unlisted protocols go last with no quota floor or ceiling
        ProtocolPolicy {
            priority: i32::MAX,
            min_configs: 0,
            max_configs: usize::MAX,
        }
    }
}

/// Select up to `target` configs across protocol buckets.
///
/// `unlimited` (or a zero target) returns everything grouped by
/// protocol, untouched and unshuffled.
pub fn balance<R: Rng>(
    configs: Vec<ProxyConfig>,
    policies: &BTreeMap<Protocol, ProtocolPolicy>,
    target: usize,
    unlimited: bool,
    rng: &mut R,
) -> BTreeMap<Protocol, Vec<ProxyConfig>> {
    let mut groups: BTreeMap<Protocol, Vec<ProxyConfig>> = BTreeMap::new();
    for config in configs {
        groups.entry(config.protocol).or_default().push(config);
    }

    if unlimited || target == 0 {
        return groups;
    }

    for group in groups.values_mut() {
        group.shuffle(rng);
    }

    // ascending priority; protocol order breaks ties deterministically
    let mut order: Vec<Protocol> = groups.keys().copied().collect();
    order.sort_by_key(|p| policy_for(policies, *p).priority);

    let mut selected: BTreeMap<Protocol, Vec<ProxyConfig>> = BTreeMap::new();
    let mut total = 0usize;

    for protocol in &order {
        if total >= target {
            break;
        }
        let policy = policy_for(policies, *protocol);
        let group = match groups.get_mut(protocol) {
            Some(g) => g,
            None => continue,
        };
        let count = group
            .len()
            .min(target - total)
            .max(policy.min_configs)
            .min(policy.max_configs)
            .min(group.len())
            .min(target - total);
        if count == 0 {
            continue;
        }
        let taken: Vec<ProxyConfig> = group.drain(..count).collect();
        total += taken.len();
        selected.entry(*protocol).or_default().extend(taken);
    }

    // backfill from whatever the quota pass left behind
    if total < target {
        let mut pool: Vec<ProxyConfig> = groups.into_values().flatten().collect();
        pool.shuffle(rng);
        for config in pool {
            if total >= target {
                break;
            }
            let policy = policy_for(policies, config.protocol);
            let bucket = selected.entry(config.protocol).or_default();
            if bucket.len() >= policy.max_configs {
                continue;
            }
            bucket.push(config);
            total += 1;
        }
    }

    debug!(total, target, protocols = selected.len(), "balanced selection");
    selected
}

fn policy_for(policies: &BTreeMap<Protocol, ProtocolPolicy>, protocol: Protocol) -> ProtocolPolicy {
    policies.get(&protocol).copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_uri;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn trojan_batch(host_prefix: &str, count: usize) -> Vec<ProxyConfig> {
        (0..count)
            .map(|i| {
                parse_uri(&format!(
                    "trojan://pw{i}@{host_prefix}{i}.example.com:443#t{i}"
                ))
                .unwrap()
            })
            .collect()
    }

    fn vless_batch(count: usize) -> Vec<ProxyConfig> {
        (0..count)
            .map(|i| {
                parse_uri(&format!(
                    "vless://123e4567-e89b-12d3-a456-42661417{i:04}@v{i}.example.com:443?security=tls#v{i}"
                ))
                .unwrap()
            })
            .collect()
    }

    fn policy(priority: i32, min: usize, max: usize) -> ProtocolPolicy {
        ProtocolPolicy {
            priority,
            min_configs: min,
            max_configs: max,
        }
    }

    #[test]
    fn test_priority_quota_selection() {
        let mut configs = vless_batch(30);
        configs.extend(trojan_batch("t", 20));
        let policies = BTreeMap::from([
            (Protocol::Vless, policy(1, 3, 6)),
            (Protocol::Trojan, policy(2, 2, 8)),
        ]);
        let mut rng = StdRng::seed_from_u64(99);
        let result = balance(configs, &policies, 10, false, &mut rng);

        let vless = result.get(&Protocol::Vless).map_or(0, Vec::len);
        let trojan = result.get(&Protocol::Trojan).map_or(0, Vec::len);
        assert!(vless >= 3 && vless <= 6, "vless bucket: {}", vless);
        assert!(trojan <= 8);
        assert!(vless + trojan <= 10);
    }

    #[test]
    fn test_deterministic_under_seed() {
        let make = || {
            let mut configs = vless_batch(30);
            configs.extend(trojan_batch("t", 20));
            configs
        };
        let policies = BTreeMap::from([
            (Protocol::Vless, policy(1, 3, 6)),
            (Protocol::Trojan, policy(2, 2, 8)),
        ]);
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        let left = balance(make(), &policies, 10, false, &mut a);
        let right = balance(make(), &policies, 10, false, &mut b);
        let names = |r: &BTreeMap<Protocol, Vec<ProxyConfig>>| -> Vec<String> {
            r.values()
                .flatten()
                .map(|c| c.name.clone())
                .collect()
        };
        assert_eq!(names(&left), names(&right));
    }

    #[test]
    fn test_unlimited_returns_everything() {
        let configs = trojan_batch("u", 5);
        let mut rng = StdRng::seed_from_u64(1);
        let result = balance(configs, &BTreeMap::new(), 2, true, &mut rng);
        assert_eq!(result[&Protocol::Trojan].len(), 5);
        // untouched input order
        assert_eq!(result[&Protocol::Trojan][0].name, "t0");
    }

    #[test]
    fn test_zero_target_means_unlimited() {
        let configs = trojan_batch("z", 4);
        let mut rng = StdRng::seed_from_u64(1);
        let result = balance(configs, &BTreeMap::new(), 0, false, &mut rng);
        assert_eq!(result[&Protocol::Trojan].len(), 4);
    }

    #[test]
    fn test_exhausted_bucket_backfilled_from_pool() {
        // vless can only ever contribute 2; trojan fills the rest
        let mut configs = vless_batch(2);
        configs.extend(trojan_batch("b", 10));
        let policies = BTreeMap::from([
            (Protocol::Vless, policy(1, 1, 2)),
            (Protocol::Trojan, policy(2, 1, 4)),
        ]);
        let mut rng = StdRng::seed_from_u64(5);
        let result = balance(configs, &policies, 6, false, &mut rng);
        let total: usize = result.values().map(Vec::len).sum();
        assert_eq!(result[&Protocol::Vless].len(), 2);
        assert_eq!(result[&Protocol::Trojan].len(), 4);
        assert_eq!(total, 6);
    }

    #[test]
    fn test_max_configs_binds_even_with_leftovers() {
        let mut configs = vless_batch(10);
        configs.extend(trojan_batch("m", 10));
        let policies = BTreeMap::from([
            (Protocol::Vless, policy(1, 0, 2)),
            (Protocol::Trojan, policy(2, 0, 4)),
        ]);
        let mut rng = StdRng::seed_from_u64(13);
        let result = balance(configs, &policies, 10, false, &mut rng);
        // both buckets capped; the pool cannot push past max_configs
        assert_eq!(result[&Protocol::Vless].len(), 2);
        assert_eq!(result[&Protocol::Trojan].len(), 4);
    }

    #[test]
    fn test_never_exceeds_target() {
        let configs = trojan_batch("n", 50);
        let mut rng = StdRng::seed_from_u64(11);
        let result = balance(configs, &BTreeMap::new(), 7, false, &mut rng);
        let total: usize = result.values().map(Vec::len).sum();
        assert_eq!(total, 7);
    }

    #[test]
    fn test_short_when_pools_exhaust() {
        let configs = trojan_batch("s", 3);
        let mut rng = StdRng::seed_from_u64(11);
        let result = balance(configs, &BTreeMap::new(), 10, false, &mut rng);
        let total: usize = result.values().map(Vec::len).sum();
        assert_eq!(total, 3);
    }
}
