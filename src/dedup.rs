//! Deduplication by canonical identity
//!
//! Two seen-sets: raw source lines (skips re-parsing identical lines
//! across fetches) and canonical keys (collapses configs that differ
//! only in their display name). First occurrence wins and insertion
//! order is preserved; the context is explicit state owned by the
//! caller, never a process-wide singleton.

use crate::config::ProxyConfig;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Default)]
pub struct DedupContext {
    seen_raw: HashSet<String>,
    seen_keys: HashSet<String>,
    name_counts: HashMap<String, usize>,
}

impl DedupContext {
    pub fn new() -> Self {
        DedupContext::default()
    }

    /// Record a raw source line; returns false if this exact line was
    /// already ingested and parsing can be skipped.
    pub fn check_raw(&mut self, raw: &str) -> bool {
        self.seen_raw.insert(raw.trim().to_string())
    }

    /// Accept a parsed config unless its canonical key was already
    /// seen. On acceptance the display name is disambiguated against
    /// earlier accepted names (` 2`, ` 3`, ...).
    pub fn accept(&mut self, mut config: ProxyConfig) -> Option<ProxyConfig> {
        let key = config.dedup_key();
        if !self.seen_keys.insert(key) {
            debug!(name = %config.name, "dropping duplicate config");
            return None;
        }
        let count = self.name_counts.entry(config.name.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            config.name = format!("{} {}", config.name, count);
        }
        Some(config)
    }

    /// Number of distinct canonical configs accepted so far.
    pub fn accepted(&self) -> usize {
        self.seen_keys.len()
    }
}

/// One-shot dedup of an already-parsed batch.
pub fn dedup_configs(configs: Vec<ProxyConfig>) -> Vec<ProxyConfig> {
    let mut ctx = DedupContext::new();
    configs.into_iter().filter_map(|c| ctx.accept(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_uri;

    #[test]
    fn test_name_fragment_does_not_defeat_dedup() {
        let a = parse_uri("trojan://pw@example.com:443#Name%20One").unwrap();
        let b = parse_uri("trojan://pw@example.com:443#Name%20Two").unwrap();
        let kept = dedup_configs(vec![a, b]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "Name One");
    }

    #[test]
    fn test_first_seen_order_preserved() {
        let configs = vec![
            parse_uri("trojan://a@example.com:443#a").unwrap(),
            parse_uri("trojan://b@example.com:443#b").unwrap(),
            parse_uri("trojan://a@example.com:443#a-again").unwrap(),
            parse_uri("trojan://c@example.com:443#c").unwrap(),
        ];
        let kept = dedup_configs(configs);
        let names: Vec<&str> = kept.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_same_name_distinct_configs_disambiguated() {
        let configs = vec![
            parse_uri("trojan://one@example.com:443#node").unwrap(),
            parse_uri("trojan://two@example.com:443#node").unwrap(),
            parse_uri("trojan://three@example.com:443#node").unwrap(),
        ];
        let kept = dedup_configs(configs);
        let names: Vec<&str> = kept.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["node", "node 2", "node 3"]);
    }

    #[test]
    fn test_raw_line_seen_set() {
        let mut ctx = DedupContext::new();
        assert!(ctx.check_raw("trojan://pw@example.com:443#x"));
        assert!(!ctx.check_raw("  trojan://pw@example.com:443#x  "));
        assert!(ctx.check_raw("trojan://other@example.com:443#x"));
    }
}
