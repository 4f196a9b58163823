//! Subforge - proxy-config canonicalization and codec engine
//!
//! Fourteen share-URI dialects and the Clash dictionary form all
//! converge on one canonical `ProxyConfig`; the canonical form is
//! re-emitted as share URIs, Clash YAML, or sing-box outbounds:
//! - per-dialect parsers with structural validation
//! - canonical-value deduplication with name disambiguation
//! - quota-based protocol balancing with injectable randomness
//! - geography-based renaming behind a collaborator trait
//!
//! # Architecture
//!
//! ```text
//!  +-----------------------------+
//!  |  pipeline/ (ingest, stats)  |
//!  +------+---------------+------+
//!         |               |
//!  +------v------+  +-----v-------+
//!  |   parser/   |  |   dedup     |
//!  | (dialects)  |  +-----+-------+
//!  +------+------+        |
//!         |        +------v------+     +-------------+
//!  +------v------+ |  balancer   |     |   rename    |
//!  |   config/   | +------+------+     +------+------+
//!  | (canonical) |        |                   |
//!  +------+------+        +---------+---------+
//!         |                         |
//!  +------v------+           +------v------+
//!  |   common/   |           |   output/   |
//!  | (codec/val) |           | (uri/clash/ |
//!  +-------------+           |  sing-box)  |
//!                            +-------------+
//! ```
//!
//! The engine does no I/O: fetching and geo lookup are collaborator
//! traits ([`pipeline::ConfigSource`], [`rename::GeoLookup`]) and every
//! shuffle takes the caller's RNG.

pub mod balancer;
pub mod common;
pub mod config;
pub mod dedup;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod rename;

pub use common::error::{Error, Result};
pub use config::{Credential, Network, Protocol, ProxyConfig, Security, Tls, Transport};
pub use dedup::DedupContext;
pub use parser::{parse_clash_proxy, parse_uri, parse_uri_with, ParseOptions};
pub use pipeline::{ConfigSource, IngestStats};
