//! Ingestion: raw subscription text or Clash documents → accepted configs
//!
//! One bad record never aborts a batch; it is counted and skipped. The
//! dedup context is owned by the caller so several sources can feed the
//! same seen-sets.

use crate::common::codec::decode_base64_text;
use crate::config::ProxyConfig;
use crate::dedup::DedupContext;
use crate::parser::{parse_clash_proxy, parse_uri_with, ParseOptions};
use crate::{Error, Result};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Where raw subscription text comes from. Retry and backoff are the
/// implementation's concern; the engine only sees the final text.
pub trait ConfigSource {
    fn fetch(&self) -> Result<String>;
}

/// Outcome counters for one ingestion batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: usize,
    pub duplicates: usize,
    /// Blank lines, comments, unsupported Clash `type` entries.
    pub skipped: usize,
    /// Rejected records, counted per failure kind.
    pub rejected: BTreeMap<&'static str, usize>,
}

impl IngestStats {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    fn record_failure(&mut self, error: &Error) {
        *self.rejected.entry(error.kind()).or_insert(0) += 1;
    }

    fn merge(&mut self, other: IngestStats) {
        self.accepted += other.accepted;
        self.duplicates += other.duplicates;
        self.skipped += other.skipped;
        for (kind, count) in other.rejected {
            *self.rejected.entry(kind).or_insert(0) += count;
        }
    }
}

/// Ingest newline-separated share URIs.
pub fn ingest_lines(
    text: &str,
    opts: &ParseOptions,
    ctx: &mut DedupContext,
) -> (Vec<ProxyConfig>, IngestStats) {
    let mut configs = Vec::new();
    let mut stats = IngestStats::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            stats.skipped += 1;
            continue;
        }
        if !line.contains("://") {
            stats.skipped += 1;
            continue;
        }
        if !ctx.check_raw(line) {
            stats.duplicates += 1;
            continue;
        }
        match parse_uri_with(line, opts) {
            Ok(config) => match ctx.accept(config) {
                Some(config) => {
                    stats.accepted += 1;
                    configs.push(config);
                }
                None => stats.duplicates += 1,
            },
            Err(error) => {
                warn!(%error, "rejected record");
                stats.record_failure(&error);
            }
        }
    }

    debug!(
        accepted = stats.accepted,
        duplicates = stats.duplicates,
        rejected = stats.rejected_total(),
        "ingested uri lines"
    );
    (configs, stats)
}

/// Ingest subscription text that may be base64-wrapped wholesale, as
/// many providers serve it.
pub fn ingest_subscription_text(
    text: &str,
    opts: &ParseOptions,
    ctx: &mut DedupContext,
) -> (Vec<ProxyConfig>, IngestStats) {
    let trimmed = text.trim();
    if !trimmed.contains("://") {
        if let Ok(decoded) = decode_base64_text(trimmed) {
            if decoded.contains("://") {
                return ingest_lines(&decoded, opts, ctx);
            }
        }
    }
    ingest_lines(text, opts, ctx)
}

/// Ingest a Clash document's `proxies:` list. Unsupported proxy types
/// are skipped; a document without a `proxies` sequence is an error.
pub fn ingest_clash_document(
    text: &str,
    opts: &ParseOptions,
    ctx: &mut DedupContext,
) -> Result<(Vec<ProxyConfig>, IngestStats)> {
    let document: serde_yaml::Value = serde_yaml::from_str(text)?;
    let proxies = document
        .get("proxies")
        .and_then(serde_yaml::Value::as_sequence)
        .ok_or_else(|| Error::config("document has no proxies list"))?;

    let mut configs = Vec::new();
    let mut stats = IngestStats::default();
    for entry in proxies {
        match parse_clash_proxy(entry, opts) {
            Ok(Some(config)) => match ctx.accept(config) {
                Some(config) => {
                    stats.accepted += 1;
                    configs.push(config);
                }
                None => stats.duplicates += 1,
            },
            Ok(None) => stats.skipped += 1,
            Err(error) => {
                warn!(%error, "rejected clash entry");
                stats.record_failure(&error);
            }
        }
    }
    Ok((configs, stats))
}

/// Fetch one source and ingest it, sniffing Clash documents by their
/// `proxies:` key.
pub fn ingest_source<S: ConfigSource>(
    source: &S,
    opts: &ParseOptions,
    ctx: &mut DedupContext,
) -> Result<(Vec<ProxyConfig>, IngestStats)> {
    let text = source.fetch()?;
    let result = if looks_like_clash(&text) {
        ingest_clash_document(&text, opts, ctx)?
    } else {
        ingest_subscription_text(&text, opts, ctx)
    };
    info!(
        accepted = result.1.accepted,
        duplicates = result.1.duplicates,
        rejected = result.1.rejected_total(),
        "ingested source"
    );
    Ok(result)
}

/// Fetch and ingest several sources into one batch.
pub fn ingest_sources<S: ConfigSource>(
    sources: &[S],
    opts: &ParseOptions,
    ctx: &mut DedupContext,
) -> (Vec<ProxyConfig>, IngestStats) {
    let mut configs = Vec::new();
    let mut stats = IngestStats::default();
    for source in sources {
        match ingest_source(source, opts, ctx) {
            Ok((batch, batch_stats)) => {
                configs.extend(batch);
                stats.merge(batch_stats);
            }
            Err(error) => {
                warn!(%error, "source failed, continuing with the rest");
                stats.record_failure(&error);
            }
        }
    }
    (configs, stats)
}

fn looks_like_clash(text: &str) -> bool {
    text.lines()
        .any(|line| line.trim_start().starts_with("proxies:"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::codec::encode_base64;
    use crate::config::Protocol;

    struct StaticSource(&'static str);

    impl ConfigSource for StaticSource {
        fn fetch(&self) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_ingest_lines_counts_outcomes() {
        let text = "\
trojan://pw@example.com:443#a

trojan://pw@example.com:443#b
vless://not-a-uuid@example.com:443#bad
socks5://x@example.com:1080#nope
just some text
";
        let mut ctx = DedupContext::new();
        let (configs, stats) = ingest_lines(text, &ParseOptions::default(), &mut ctx);
        assert_eq!(configs.len(), 1);
        assert_eq!(stats.accepted, 1);
        // same canonical value, different fragment
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.rejected["invalid-credential"], 1);
        assert_eq!(stats.rejected["unsupported-scheme"], 1);
    }

    #[test]
    fn test_identical_raw_line_short_circuits() {
        let mut ctx = DedupContext::new();
        let line = "trojan://pw@example.com:443#a\n";
        let (_, first) = ingest_lines(line, &ParseOptions::default(), &mut ctx);
        let (_, second) = ingest_lines(line, &ParseOptions::default(), &mut ctx);
        assert_eq!(first.accepted, 1);
        assert_eq!(second.accepted, 0);
        assert_eq!(second.duplicates, 1);
    }

    #[test]
    fn test_base64_wrapped_subscription_body() {
        let body = "trojan://pw@example.com:443#a\ntrojan://pw2@example.com:443#b\n";
        let wrapped = encode_base64(body.as_bytes());
        let mut ctx = DedupContext::new();
        let (configs, stats) =
            ingest_subscription_text(&wrapped, &ParseOptions::default(), &mut ctx);
        assert_eq!(configs.len(), 2);
        assert_eq!(stats.accepted, 2);
    }

    #[test]
    fn test_clash_document_walk() {
        let doc = r#"
proxies:
  - name: t
    type: trojan
    server: example.com
    port: 443
    password: pw
  - name: unsupported
    type: socks5
    server: example.com
    port: 1080
  - name: broken
    type: trojan
    server: example.com
    port: 99999
    password: pw
"#;
        let mut ctx = DedupContext::new();
        let (configs, stats) =
            ingest_clash_document(doc, &ParseOptions::default(), &mut ctx).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].protocol, Protocol::Trojan);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.rejected["invalid-server-or-port"], 1);
    }

    #[test]
    fn test_document_without_proxies_is_error() {
        let mut ctx = DedupContext::new();
        assert!(matches!(
            ingest_clash_document("rules: []", &ParseOptions::default(), &mut ctx),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_ingest_sources_shares_dedup_state() {
        let sources = [
            StaticSource("trojan://pw@example.com:443#a"),
            StaticSource("trojan://pw@example.com:443#b"),
        ];
        let mut ctx = DedupContext::new();
        let (configs, stats) = ingest_sources(&sources, &ParseOptions::default(), &mut ctx);
        assert_eq!(configs.len(), 1);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.duplicates, 1);
    }
}
